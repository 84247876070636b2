//! Instruction templates (C5): an addressing-code shaped recipe plus the
//! mnemonic it decodes to, and the decoded `Instruction` it produces.

use super::operand::Operand;
use super::registers;
use super::state::{DecodeError, DecoderState};
use super::width::{FetchWidth, ToggleWidth, Width};

/// One operand's addressing code, following the Intel manual's notation
/// (`Eb`, `Gv`, `Jz`, ...). `Fixed` covers literal register operands,
/// including the `?ax`-style family that resolves against the current
/// operand width.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OperandCode {
    Eb,
    Ew,
    Ev,
    Ey,
    Ep,
    Gb,
    Gw,
    Gv,
    Gy,
    Gz,
    Jb,
    Jz,
    Ib,
    Iw,
    Iv,
    Iz,
    Isb,
    Ap,
    Ma,
    Mp,
    Mv,
    Fv,
    Xb,
    Xv,
    Xz,
    Yb,
    Yv,
    Yz,
    Sw,
    Ob,
    Ov,
    Rd,
    Cd,
    Dd,
    Fixed(&'static str),
}

impl OperandCode {
    fn needs_modrm(self) -> bool {
        matches!(
            self,
            OperandCode::Eb
                | OperandCode::Ew
                | OperandCode::Ev
                | OperandCode::Ey
                | OperandCode::Ep
                | OperandCode::Gb
                | OperandCode::Gw
                | OperandCode::Gv
                | OperandCode::Gy
                | OperandCode::Gz
                | OperandCode::Ma
                | OperandCode::Mp
                | OperandCode::Mv
                | OperandCode::Rd
                | OperandCode::Cd
                | OperandCode::Dd
                | OperandCode::Sw
        )
    }

    fn resolve(self, state: &mut DecoderState) -> Result<Operand, DecodeError> {
        match self {
            OperandCode::Eb => decode_e(state, Width::W8),
            OperandCode::Ew => decode_e(state, Width::W16),
            OperandCode::Ev => decode_e(state, state.operand_width.as_width()),
            OperandCode::Ey => decode_e(state, Width::W32),
            OperandCode::Ep => decode_e_far_pointer(state),
            OperandCode::Gb => Ok(Operand::register(registers::R8_DECODE[state.modrm_unchecked().reg as usize])),
            OperandCode::Gw => Ok(Operand::register(registers::R16_DECODE[state.modrm_unchecked().reg as usize])),
            OperandCode::Gv => {
                let reg = registers::gpr_decode(state.operand_width.as_width())[state.modrm_unchecked().reg as usize];
                Ok(Operand::register(reg))
            }
            OperandCode::Gy => Ok(Operand::register(registers::R32_DECODE[state.modrm_unchecked().reg as usize])),
            OperandCode::Gz => {
                let table = if state.operand_width == ToggleWidth::W16 {
                    &registers::R16_DECODE
                } else {
                    &registers::R32_DECODE
                };
                Ok(Operand::register(table[state.modrm_unchecked().reg as usize]))
            }
            OperandCode::Jb => {
                let v = state.fetch_mp(FetchWidth::B8)? as u64;
                Ok(Operand::Immediate(super::operand::Immediate::new(v, Width::W8, true)))
            }
            OperandCode::Jz => {
                let fw = FetchWidth::from_toggle(state.operand_width);
                let v = state.fetch_mp(fw)? as u64;
                Ok(Operand::Immediate(super::operand::Immediate::new(v, fw.as_width(), true)))
            }
            OperandCode::Ib => {
                let v = state.fetch_mp(FetchWidth::B8)? as u64;
                Ok(Operand::Immediate(super::operand::Immediate::new(v, Width::W8, false)))
            }
            OperandCode::Isb => {
                // 83/XX group: fetch imm8, sign-extend into the current
                // operand width rather than the group 1 Ev,Iz/Ib unsigned forms.
                let raw = state.fetch_mp(FetchWidth::B8)? as u8 as i8 as i64 as u64;
                let width = state.operand_width.as_width();
                Ok(Operand::Immediate(super::operand::Immediate::new(raw, width, true)))
            }
            OperandCode::Iw => {
                let v = state.fetch_mp(FetchWidth::B16)? as u64;
                Ok(Operand::Immediate(super::operand::Immediate::new(v, Width::W16, false)))
            }
            OperandCode::Iv | OperandCode::Iz => {
                let fw = FetchWidth::from_toggle(state.operand_width);
                let v = state.fetch_mp(fw)? as u64;
                Ok(Operand::Immediate(super::operand::Immediate::new(v, fw.as_width(), false)))
            }
            OperandCode::Ap => {
                // Wire order is offset then segment selector, regardless of
                // operand width.
                let off_fw = FetchWidth::from_toggle(state.operand_width);
                let off = state.fetch_mp(off_fw)? as u64;
                let seg = state.fetch_mp(FetchWidth::B16)? as u64;
                Ok(Operand::FarPointer {
                    seg: super::operand::Immediate::new(seg, Width::W16, false),
                    off: super::operand::Immediate::new(off, off_fw.as_width(), false),
                })
            }
            OperandCode::Ma => {
                if state.modrm_unchecked().md == 3 {
                    return Err(DecodeError::InvalidOpcode);
                }
                let width = match state.operand_width {
                    ToggleWidth::W16 => Width::W32,
                    ToggleWidth::W32 => Width::W64,
                };
                Ok(Operand::Memory(state.decode_memory_ref(width)?))
            }
            OperandCode::Mp => {
                if state.modrm_unchecked().md == 3 {
                    return Err(DecodeError::InvalidOpcode);
                }
                Ok(Operand::Memory(state.decode_memory_ref(Width::W48)?))
            }
            OperandCode::Mv => {
                if state.modrm_unchecked().md == 3 {
                    return Err(DecodeError::InvalidOpcode);
                }
                Ok(Operand::Memory(state.decode_memory_ref(state.operand_width.as_width())?))
            }
            OperandCode::Fv => {
                let r = match state.operand_width {
                    ToggleWidth::W16 => registers::FLAGS,
                    ToggleWidth::W32 => registers::EFLAGS,
                };
                Ok(Operand::register(r))
            }
            OperandCode::Xb => Ok(decode_string_mem(state, Width::W8, true, true)),
            OperandCode::Xv | OperandCode::Xz => {
                Ok(decode_string_mem(state, state.operand_width.as_width(), true, true))
            }
            OperandCode::Yb => Ok(decode_string_mem(state, Width::W8, false, false)),
            OperandCode::Yv | OperandCode::Yz => {
                Ok(decode_string_mem(state, state.operand_width.as_width(), false, false))
            }
            OperandCode::Sw => {
                let r = registers::SEG_DECODE[state.modrm_unchecked().reg as usize];
                r.map(Operand::register).ok_or(DecodeError::InvalidOpcode)
            }
            OperandCode::Ob => Ok(decode_moffs(state, Width::W8)?),
            OperandCode::Ov => {
                let width = state.operand_width.as_width();
                Ok(decode_moffs(state, width)?)
            }
            OperandCode::Rd => {
                let modrm = state.modrm_unchecked();
                if modrm.md != 3 {
                    return Err(DecodeError::InvalidOpcode);
                }
                Ok(Operand::register(registers::R32_DECODE[modrm.rm as usize]))
            }
            OperandCode::Cd => {
                let r = registers::CONTROL_DECODE[state.modrm_unchecked().reg as usize];
                r.map(Operand::register).ok_or(DecodeError::InvalidOpcode)
            }
            OperandCode::Dd => {
                let r = registers::DEBUG_DECODE[state.modrm_unchecked().reg as usize];
                r.map(Operand::register).ok_or(DecodeError::InvalidOpcode)
            }
            OperandCode::Fixed(token) => {
                Ok(Operand::register(registers::resolve_named(token, state.operand_width.as_width())))
            }
        }
    }
}

fn decode_e(state: &mut DecoderState, width: Width) -> Result<Operand, DecodeError> {
    let modrm = state.modrm_unchecked();
    if modrm.md == 3 {
        let reg = registers::gpr_decode(width)[modrm.rm as usize];
        return Ok(Operand::register(reg));
    }
    Ok(Operand::Memory(state.decode_memory_ref(width)?))
}

fn decode_e_far_pointer(state: &mut DecoderState) -> Result<Operand, DecodeError> {
    // Ep addresses a far pointer (seg:off) held in memory; the register
    // form (mod==3) has no encoding and is invalid.
    if state.modrm_unchecked().md == 3 {
        return Err(DecodeError::InvalidOpcode);
    }
    Ok(Operand::Memory(state.decode_memory_ref(Width::W48)?))
}

/// `Xb/Xv/Xz` (`[DS:rSI]`, segment overridable) and `Yb/Yv/Yz` (`[ES:rDI]`,
/// segment fixed) per §4.3: neither fetches ModR/M or SIB, the base
/// register just follows the current address-width.
fn decode_string_mem(state: &DecoderState, width: Width, is_source: bool, overridable: bool) -> Operand {
    let base = match state.address_width {
        ToggleWidth::W16 => {
            if is_source {
                registers::SI
            } else {
                registers::DI
            }
        }
        ToggleWidth::W32 => {
            if is_source {
                registers::ESI
            } else {
                registers::EDI
            }
        }
    };
    let seg = if overridable {
        state
            .seg_override
            .map(super::state::SegOverride::register)
            .unwrap_or(registers::DS)
    } else {
        registers::ES
    };
    Operand::Memory(super::operand::MemoryRef {
        width,
        seg,
        base: Some(base),
        index: None,
        scale: 1,
        displacement: None,
    })
}

/// `Ob/Ov`: an absolute address embedded right after the opcode, whose
/// width follows the current address-width, not operand-width.
fn decode_moffs(state: &mut DecoderState, width: Width) -> Result<Operand, DecodeError> {
    let addr_fw = FetchWidth::from_toggle(state.address_width);
    let addr = state.fetch_mp(addr_fw)? as u64;
    let seg = state
        .seg_override
        .map(super::state::SegOverride::register)
        .unwrap_or(registers::DS);
    Ok(Operand::Memory(super::operand::MemoryRef {
        width,
        seg,
        base: None,
        index: None,
        scale: 1,
        displacement: Some(super::operand::Immediate::new(addr, addr_fw.as_width(), false)),
    }))
}

/// A decode recipe: mnemonic plus the ordered operand codes to resolve.
#[derive(Debug, Copy, Clone)]
pub struct Template {
    pub mnemonic: &'static str,
    pub operands: &'static [OperandCode],
}

impl Template {
    pub const fn new(mnemonic: &'static str, operands: &'static [OperandCode]) -> Self {
        Template { mnemonic, operands }
    }

    fn modrm_needed(&self) -> bool {
        self.operands.iter().any(|op| op.needs_modrm())
    }

    /// Applies the `66`/`67` toggles, fetches ModR/M and SIB as needed, then
    /// resolves each operand code in declared order (displacement always
    /// lands before any immediate, matching the wire encoding).
    pub(crate) fn decode(&self, state: &mut DecoderState) -> Result<Instruction, DecodeError> {
        if state.prefix_66 {
            state.toggle_operand_width();
        }
        if state.prefix_67 {
            state.toggle_address_width();
        }

        if self.modrm_needed() {
            let modrm = state.fetch_modrm()?;
            if state.address_width == ToggleWidth::W32 && modrm.md != 3 && modrm.rm == 4 {
                state.fetch_sib()?;
            }
        }

        let mut operands = Vec::with_capacity(self.operands.len());
        for code in self.operands {
            operands.push(code.resolve(state)?);
        }

        Ok(Instruction {
            mnemonic: self.mnemonic,
            operands,
            lock: state.prefix_f0,
            repne: state.prefix_f2,
            repe: state.prefix_f3,
            seg_override: state.seg_override,
            opcode_hex: state.opcode_hex.clone(),
        })
    }
}

/// A fully decoded instruction, ready to print.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub mnemonic: &'static str,
    pub operands: Vec<Operand>,
    pub lock: bool,
    pub repne: bool,
    pub repe: bool,
    pub seg_override: Option<super::state::SegOverride>,
    pub opcode_hex: String,
}
