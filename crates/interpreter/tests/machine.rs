use cadenza_interpreter::{texel_address, Env, EvalValue, Event, Machine, Memory};
use cadenza_ir::{
    builder::test_util::func_builder,
    inst::{
        AccessFlags, AluOp, AtomicOp, CompareFunc, ImagePayload, InstData, Intrinsic,
        TexPayload,
    },
    ImageDim, ImageFormat, ImageVar, Payload, Type, VarData,
};

#[test]
fn loop_sums_with_phis() {
    let mut builder = func_builder(&[Type::I32]);
    let [b0, b1, b2, b3] = [(); 4].map(|_| builder.append_block());
    let n = builder.arg(0);

    builder.switch_to_block(b0);
    let zero = builder.imm(0i32);
    let one = builder.imm(1i32);
    builder.jump(b1);

    builder.switch_to_block(b1);
    let i = builder.phi(Type::I32, &[(zero, b0)]);
    let acc = builder.phi(Type::I32, &[(zero, b0)]);
    let more = builder.alu(AluOp::Ilt, &[i, n], Type::I1);
    builder.br(more, b2, b3);

    builder.switch_to_block(b2);
    let next_acc = builder.alu(AluOp::Iadd, &[acc, i], Type::I32);
    let next_i = builder.alu(AluOp::Iadd, &[i, one], Type::I32);
    builder.append_phi_arg(i, next_i, b2);
    builder.append_phi_arg(acc, next_acc, b2);
    builder.jump(b1);

    builder.switch_to_block(b3);
    builder.ret(&[acc]);
    let func = builder.finish();

    let mut machine = Machine::new(&func, Env::default());
    assert_eq!(machine.run(&[EvalValue::I(5)]), [EvalValue::I(10)]);
    assert_eq!(machine.run(&[EvalValue::I(0)]), [EvalValue::I(0)]);
    assert!(machine.events().is_empty());
}

#[test]
fn phis_read_their_operands_together() {
    let mut builder = func_builder(&[Type::I32, Type::I32]);
    let [b0, b1, b2] = [(); 3].map(|_| builder.append_block());
    let (x, y) = (builder.arg(0), builder.arg(1));

    builder.switch_to_block(b0);
    builder.jump(b1);

    builder.switch_to_block(b1);
    let a = builder.phi(Type::I32, &[(x, b0)]);
    let b = builder.phi(Type::I32, &[(y, b0)]);
    builder.append_phi_arg(a, b, b1);
    builder.append_phi_arg(b, a, b1);
    let (yes, no) = (builder.imm(true), builder.imm(false));
    let again = builder.phi(Type::I1, &[(yes, b0), (no, b1)]);
    builder.br(again, b1, b2);

    builder.switch_to_block(b2);
    builder.ret(&[a, b]);
    let func = builder.finish();

    let mut machine = Machine::new(&func, Env::default());
    assert_eq!(
        machine.run(&[EvalValue::I(1), EvalValue::I(2)]),
        [EvalValue::I(2), EvalValue::I(1)]
    );
}

#[test]
fn atomics_and_stores_are_logged() {
    let mut builder = func_builder(&[Type::I32, Type::I32]);
    let b0 = builder.append_block();
    builder.switch_to_block(b0);
    let (addr, data) = (builder.arg(0), builder.arg(1));

    let old = builder.insert_value(
        InstData::intrinsic(
            Intrinsic::GlobalAtomic,
            &[addr, data],
            Payload::Atomic {
                op: AtomicOp::Max,
                access: AccessFlags::empty(),
            },
        ),
        Type::I32,
    );
    let one = builder.imm(1i32);
    let next = builder.alu(AluOp::Iadd, &[addr, one], Type::I32);
    builder.insert_effect(InstData::intrinsic(
        Intrinsic::Store,
        &[next, old],
        Payload::None,
    ));
    builder.ret(&[old]);
    let func = builder.finish();

    let mut memory = Memory::new();
    memory.init(16, 7);
    let mut machine = Machine::new(&func, Env::default()).with_memory(memory);

    assert_eq!(
        machine.run(&[EvalValue::I(16), EvalValue::I(9)]),
        [EvalValue::I(7)]
    );
    assert_eq!(
        machine.events(),
        [
            Event::Atomic {
                addr: 16,
                op: AtomicOp::Max,
                old: 7,
                new: 9
            },
            Event::Store { addr: 17, value: 7 },
        ]
    );
    assert_eq!(machine.memory().read(16), 9);
}

#[test]
fn image_operations_share_texel_addresses() {
    let mut builder = func_builder(&[Type::I32.vec(2), Type::F32]);
    let b0 = builder.append_block();
    builder.switch_to_block(b0);
    let (coord, value) = (builder.arg(0), builder.arg(1));

    let var = builder.declare_var(VarData::image(
        "img",
        2,
        ImageVar {
            dim: ImageDim::Dim2D,
            arrayed: false,
            format: ImageFormat::R32Float,
        },
    ));
    let image = builder.deref_var(var);
    let zero = builder.imm(0i32);
    let payload = Payload::Image(ImagePayload::new(ImageDim::Dim2D));

    builder.insert_effect(InstData::intrinsic(
        Intrinsic::ImageStore,
        &[image, coord, zero, value],
        payload,
    ));
    let loaded = builder.intrinsic(Intrinsic::ImageLoad, &[image, coord, zero], payload, Type::F32);
    let addr = builder.intrinsic(
        Intrinsic::ImageTexelAddress,
        &[image, coord, zero],
        payload,
        Type::I32,
    );
    builder.ret(&[loaded, addr]);
    let func = builder.finish();

    let texel = texel_address(2, 3, 4, 0);
    let mut machine = Machine::new(&func, Env::default());
    let coord = EvalValue::Vec(vec![EvalValue::I(3), EvalValue::I(4)]);
    assert_eq!(
        machine.run(&[coord, EvalValue::F(0.5)]),
        [EvalValue::F(0.5), EvalValue::I(texel as i64)]
    );
    assert_eq!(
        machine.events(),
        [Event::Store {
            addr: texel,
            value: 0.5f32.to_bits()
        }]
    );
}

#[test]
fn subpass_loads_are_relative_to_the_fragment() {
    let mut builder = func_builder(&[Type::I32.vec(2)]);
    let b0 = builder.append_block();
    builder.switch_to_block(b0);
    let offset = builder.arg(0);

    let var = builder.declare_var(VarData::image(
        "color",
        1,
        ImageVar {
            dim: ImageDim::Subpass,
            arrayed: false,
            format: ImageFormat::R32Float,
        },
    ));
    let image = builder.deref_var(var);
    let zero = builder.imm(0i32);
    let texel = builder.intrinsic(
        Intrinsic::ImageLoad,
        &[image, offset, zero],
        Payload::Image(ImagePayload::new(ImageDim::Subpass)),
        Type::F32,
    );
    builder.ret(&[texel]);
    let func = builder.finish();

    let mut memory = Memory::new();
    memory.init(texel_address(1, 3, 4, 0), 0.25f32.to_bits());
    let env = Env {
        frag_coord: [2.7, 5.2],
        ..Env::default()
    };
    let mut machine = Machine::new(&func, env).with_memory(memory);

    let offset = EvalValue::Vec(vec![EvalValue::I(1), EvalValue::I(-1)]);
    assert_eq!(machine.run(&[offset]), [EvalValue::F(0.25)]);
}

#[test]
fn shadow_fetch_compares_against_depth() {
    let mut builder = func_builder(&[Type::HANDLE, Type::F32.vec(2), Type::F32]);
    let b0 = builder.append_block();
    builder.switch_to_block(b0);
    let (image, coord, reference) = (builder.arg(0), builder.arg(1), builder.arg(2));
    let lit = builder.intrinsic(
        Intrinsic::Tex,
        &[image, coord, reference],
        Payload::Tex(TexPayload {
            dim: ImageDim::Dim2D,
            arrayed: false,
            compare: Some(CompareFunc::Less),
        }),
        Type::F32,
    );
    builder.ret(&[lit]);
    let func = builder.finish();

    let mut memory = Memory::new();
    memory.init(texel_address(3, 1, 2, 0), 0.5f32.to_bits());
    let mut machine = Machine::new(&func, Env::default()).with_memory(memory);

    let coord = EvalValue::Vec(vec![EvalValue::F(1.9), EvalValue::F(2.2)]);
    let args = |reference| [EvalValue::Handle(3), coord.clone(), EvalValue::F(reference)];
    assert_eq!(machine.run(&args(0.25)), [EvalValue::F(1.0)]);
    assert_eq!(machine.run(&args(0.75)), [EvalValue::F(0.0)]);
}

#[test]
fn environment_drives_intrinsics() {
    let mut builder = func_builder(&[]);
    let [b0, b1, b2] = [(); 3].map(|_| builder.append_block());

    builder.switch_to_block(b0);
    let helper = builder.intrinsic(Intrinsic::IsHelper, &[], Payload::None, Type::I1);
    builder.br(helper, b1, b2);

    builder.switch_to_block(b1);
    let layer = builder.intrinsic(Intrinsic::LayerId, &[], Payload::None, Type::I32);
    builder.ret(&[layer]);

    builder.switch_to_block(b2);
    let view = builder.intrinsic(Intrinsic::ViewId, &[], Payload::None, Type::I32);
    builder.ret(&[view]);
    let func = builder.finish();

    let env = Env {
        is_helper: true,
        layer: 3,
        view: 5,
        ..Env::default()
    };
    assert_eq!(Machine::new(&func, env).run(&[]), [EvalValue::I(3)]);

    let env = Env {
        is_helper: false,
        ..env
    };
    assert_eq!(Machine::new(&func, env).run(&[]), [EvalValue::I(5)]);
}

#[test]
#[should_panic(expected = "ran out of fuel")]
fn endless_loops_run_out_of_fuel() {
    let mut builder = func_builder(&[]);
    let b0 = builder.append_block();
    builder.switch_to_block(b0);
    builder.jump(b0);
    let func = builder.finish();

    Machine::new(&func, Env::default()).with_fuel(16).run(&[]);
}
