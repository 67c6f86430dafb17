use cadenza_ir::{Immediate, SrcMod, Type};

/// A runtime value.
///
/// Vector values hold one scalar per lane. Integers are kept sign-extended
/// from the width of their type.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EvalValue {
    #[default]
    Undef,
    I(i64),
    F(f32),
    B(bool),
    /// A resource binding slot.
    Handle(u32),
    Vec(Vec<EvalValue>),
}

impl EvalValue {
    pub fn from_imm(imm: Immediate) -> Self {
        match imm {
            Immediate::I1(b) => Self::B(b),
            Immediate::I32(v) => Self::I(v as i64),
            Immediate::I64(v) => Self::I(v),
            Immediate::F32(bits) => Self::F(f32::from_bits(bits)),
        }
    }

    /// Reinterprets a 32-bit memory word as a scalar of type `ty`.
    pub fn from_bits(bits: u32, ty: Type) -> Self {
        if ty.is_float() {
            Self::F(f32::from_bits(bits))
        } else if ty.is_bool() {
            Self::B(bits != 0)
        } else if ty.is_integral() {
            Self::I(wrap_int(bits as i64, ty.bits.min(32)))
        } else {
            Self::Handle(bits)
        }
    }

    /// Returns the memory word holding a scalar.
    pub fn to_bits(&self) -> Option<u32> {
        match self {
            Self::I(v) => Some(*v as u32),
            Self::F(f) => Some(f.to_bits()),
            Self::B(b) => Some(*b as u32),
            Self::Handle(h) => Some(*h),
            Self::Undef | Self::Vec(_) => None,
        }
    }

    pub fn is_undef(&self) -> bool {
        matches!(self, Self::Undef)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I(v) => Some(*v),
            Self::B(b) => Some(*b as i64),
            Self::Handle(h) => Some(*h as i64),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::B(b) => Some(*b),
            Self::I(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Returns the lanes of a vector, or the scalar itself as a single lane.
    pub fn lanes(&self) -> &[EvalValue] {
        match self {
            Self::Vec(lanes) => lanes,
            scalar => std::slice::from_ref(scalar),
        }
    }

    /// Returns lane `idx` of a vector. Scalars are broadcast.
    pub fn lane(&self, idx: usize) -> EvalValue {
        match self {
            Self::Vec(lanes) => lanes.get(idx).cloned().unwrap_or_default(),
            scalar => scalar.clone(),
        }
    }

    pub fn map(&self, f: impl Fn(&EvalValue) -> EvalValue) -> EvalValue {
        match self {
            Self::Vec(lanes) => Self::Vec(lanes.iter().map(f).collect()),
            scalar => f(scalar),
        }
    }

    /// Combines two values lane by lane, broadcasting a scalar operand.
    pub fn zip_with(
        &self,
        rhs: &EvalValue,
        f: impl Fn(&EvalValue, &EvalValue) -> EvalValue,
    ) -> EvalValue {
        match (self, rhs) {
            (Self::Vec(lhs), Self::Vec(rhs)) => {
                assert_eq!(lhs.len(), rhs.len(), "lane count mismatch");
                Self::Vec(lhs.iter().zip(rhs).map(|(a, b)| f(a, b)).collect())
            }
            (Self::Vec(lhs), rhs) => Self::Vec(lhs.iter().map(|a| f(a, rhs)).collect()),
            (lhs, Self::Vec(rhs)) => Self::Vec(rhs.iter().map(|b| f(lhs, b)).collect()),
            (lhs, rhs) => f(lhs, rhs),
        }
    }

    /// Applies a source modifier.
    pub fn modify(&self, modifier: SrcMod) -> EvalValue {
        match modifier {
            SrcMod::None => self.clone(),
            SrcMod::Neg => self.map(|v| match v {
                Self::F(f) => Self::F(-f),
                Self::I(i) => Self::I(i.wrapping_neg()),
                _ => Self::Undef,
            }),
            SrcMod::Abs => self.map(|v| match v {
                Self::F(f) => Self::F(f.abs()),
                Self::I(i) => Self::I(i.wrapping_abs()),
                _ => Self::Undef,
            }),
            SrcMod::NegAbs => self.map(|v| match v {
                Self::F(f) => Self::F(-f.abs()),
                Self::I(i) => Self::I(i.wrapping_abs().wrapping_neg()),
                _ => Self::Undef,
            }),
            SrcMod::Not => self.map(|v| match v {
                Self::B(b) => Self::B(!b),
                Self::I(i) => Self::I(!i),
                _ => Self::Undef,
            }),
        }
    }
}

/// Truncates `value` to `bits` and sign-extends it back.
pub(crate) fn wrap_int(value: i64, bits: u8) -> i64 {
    if bits == 0 || bits >= 64 {
        return value;
    }
    let shift = 64 - bits as u32;
    (value << shift) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap() {
        assert_eq!(wrap_int(0xffff_ffff, 32), -1);
        assert_eq!(wrap_int(0x1_0000_0001, 32), 1);
        assert_eq!(wrap_int(i64::MIN, 64), i64::MIN);
    }

    #[test]
    fn modifiers_apply_per_lane() {
        let v = EvalValue::Vec(vec![EvalValue::F(-1.5), EvalValue::F(2.0)]);
        assert_eq!(
            v.modify(SrcMod::NegAbs),
            EvalValue::Vec(vec![EvalValue::F(-1.5), EvalValue::F(-2.0)])
        );
        assert_eq!(EvalValue::B(true).modify(SrcMod::Not), EvalValue::B(false));
        assert_eq!(EvalValue::Undef.modify(SrcMod::Neg), EvalValue::Undef);
    }

    #[test]
    fn memory_words() {
        assert_eq!(EvalValue::from_bits(0xffff_fffe, Type::I32), EvalValue::I(-2));
        assert_eq!(EvalValue::F(1.0).to_bits(), Some(0x3f80_0000));
        assert_eq!(
            EvalValue::from_bits(0x3f80_0000, Type::F32),
            EvalValue::F(1.0)
        );
        assert_eq!(EvalValue::Undef.to_bits(), None);
    }
}
