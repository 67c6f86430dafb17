pub mod builder;
pub mod cfg;
pub mod dfg;
pub mod domtree;
pub mod func_cursor;
pub mod function;
pub mod inst;
pub mod ir_writer;
pub mod layout;
pub mod loop_analysis;
pub mod metadata;
pub mod module;
pub mod types;
pub mod value;
pub mod var;

pub use builder::FunctionBuilder;
pub use cfg::ControlFlowGraph;
pub use dfg::{Block, BlockId, DataFlowGraph};
pub use domtree::DomTree;
pub use func_cursor::{CursorLocation, FuncCursor, InstInserter};
pub use function::Function;
pub use inst::{InstData, InstId, Opcode, Payload, Src, SrcMod};
pub use layout::Layout;
pub use loop_analysis::LoopTree;
pub use metadata::Metadata;
pub use module::{FuncRef, Module};
pub use types::{ElemKind, Type};
pub use value::{Immediate, Value, ValueId};
pub use var::{ImageDim, ImageFormat, ImageVar, VarData, VarId, VarKind};
