//! Static register tables used by the operand resolver (C3) and printer
//! (C6). Mirrors `mcode.py`'s `_register_map` plus the decode-order arrays
//! derived from it (`_r8_decode`, `_r16_decode`, ...).

use super::width::Width;

/// A single named, fixed-width machine register.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Register {
    pub name: &'static str,
    pub width: Width,
}

const fn reg(name: &'static str, width: Width) -> Register {
    Register { name, width }
}

pub const AL: Register = reg("al", Width::W8);
pub const CL: Register = reg("cl", Width::W8);
pub const DL: Register = reg("dl", Width::W8);
pub const BL: Register = reg("bl", Width::W8);
pub const AH: Register = reg("ah", Width::W8);
pub const CH: Register = reg("ch", Width::W8);
pub const DH: Register = reg("dh", Width::W8);
pub const BH: Register = reg("bh", Width::W8);

pub const AX: Register = reg("ax", Width::W16);
pub const CX: Register = reg("cx", Width::W16);
pub const DX: Register = reg("dx", Width::W16);
pub const BX: Register = reg("bx", Width::W16);
pub const SP: Register = reg("sp", Width::W16);
pub const BP: Register = reg("bp", Width::W16);
pub const SI: Register = reg("si", Width::W16);
pub const DI: Register = reg("di", Width::W16);

pub const EAX: Register = reg("eax", Width::W32);
pub const ECX: Register = reg("ecx", Width::W32);
pub const EDX: Register = reg("edx", Width::W32);
pub const EBX: Register = reg("ebx", Width::W32);
pub const ESP: Register = reg("esp", Width::W32);
pub const EBP: Register = reg("ebp", Width::W32);
pub const ESI: Register = reg("esi", Width::W32);
pub const EDI: Register = reg("edi", Width::W32);

pub const ES: Register = reg("es", Width::W16);
pub const CS: Register = reg("cs", Width::W16);
pub const SS: Register = reg("ss", Width::W16);
pub const DS: Register = reg("ds", Width::W16);
pub const FS: Register = reg("fs", Width::W16);
pub const GS: Register = reg("gs", Width::W16);

pub const DR0: Register = reg("dr0", Width::W32);
pub const DR1: Register = reg("dr1", Width::W32);
pub const DR2: Register = reg("dr2", Width::W32);
pub const DR3: Register = reg("dr3", Width::W32);
pub const DR6: Register = reg("dr6", Width::W32);
pub const DR7: Register = reg("dr7", Width::W32);

pub const CR0: Register = reg("cr0", Width::W32);
pub const CR2: Register = reg("cr2", Width::W32);
pub const CR3: Register = reg("cr3", Width::W32);
pub const CR4: Register = reg("cr4", Width::W32);

pub const FLAGS: Register = reg("flags", Width::W16);
pub const EFLAGS: Register = reg("eflags", Width::W32);

/// Decode table for a ModR/M `reg`/`rm` field against 8-bit GPRs.
pub const R8_DECODE: [Register; 8] = [AL, CL, DL, BL, AH, CH, DH, BH];
/// ... against 16-bit GPRs.
pub const R16_DECODE: [Register; 8] = [AX, CX, DX, BX, SP, BP, SI, DI];
/// ... against 32-bit GPRs.
pub const R32_DECODE: [Register; 8] = [EAX, ECX, EDX, EBX, ESP, EBP, ESI, EDI];

/// Segment register decode table; slots 6 and 7 are reserved.
pub const SEG_DECODE: [Option<Register>; 8] = [
    Some(ES),
    Some(CS),
    Some(SS),
    Some(DS),
    Some(FS),
    Some(GS),
    None,
    None,
];

/// Debug register decode table (`Dd`); DR4/DR5 are reserved (aliased to
/// DR6/DR7 on real hardware, but invalid as ModR/M.reg selectors here).
pub const DEBUG_DECODE: [Option<Register>; 8] = [
    Some(DR0),
    Some(DR1),
    Some(DR2),
    Some(DR3),
    None,
    None,
    Some(DR6),
    Some(DR7),
];

/// Control register decode table (`Cd`); CR1 and CR5-CR7 are reserved.
pub const CONTROL_DECODE: [Option<Register>; 8] = [
    Some(CR0),
    None,
    Some(CR2),
    Some(CR3),
    Some(CR4),
    None,
    None,
    None,
];

/// `ST(0)`..`ST(7)`, selected by ModR/M.rm under the FPU escape maps.
pub const ST_DECODE: [Register; 8] = [
    reg("st(0)", Width::W80),
    reg("st(1)", Width::W80),
    reg("st(2)", Width::W80),
    reg("st(3)", Width::W80),
    reg("st(4)", Width::W80),
    reg("st(5)", Width::W80),
    reg("st(6)", Width::W80),
    reg("st(7)", Width::W80),
];

/// GPR decode table selected by width: index with `0=8bit 1=16bit 2=32bit`
/// matching `Width`'s discriminant order for those three variants.
pub fn gpr_decode(width: Width) -> &'static [Register; 8] {
    match width {
        Width::W8 => &R8_DECODE,
        Width::W16 => &R16_DECODE,
        Width::W32 => &R32_DECODE,
        _ => unreachable!("gpr_decode only called with 8/16/32-bit widths"),
    }
}

/// Resolves a literal lowercase operand-code token (e.g. `al`, `cl`, `dx`,
/// `fs`) to its register, with the `?ax`-style family resolved against the
/// current operand width (`?ax` => `ax`/`eax`, `?cx` => `cx`/`ecx`, ...).
pub fn resolve_named(token: &str, operand_width: Width) -> Register {
    if let Some(suffix) = token.strip_prefix('?') {
        let prefix = if operand_width == Width::W16 { "" } else { "e" };
        let full = match suffix {
            "ax" => match prefix {
                "" => return AX,
                _ => return EAX,
            },
            "cx" => match prefix {
                "" => return CX,
                _ => return ECX,
            },
            "dx" => match prefix {
                "" => return DX,
                _ => return EDX,
            },
            "bx" => match prefix {
                "" => return BX,
                _ => return EBX,
            },
            "sp" => match prefix {
                "" => return SP,
                _ => return ESP,
            },
            "bp" => match prefix {
                "" => return BP,
                _ => return EBP,
            },
            "si" => match prefix {
                "" => return SI,
                _ => return ESI,
            },
            "di" => match prefix {
                "" => return DI,
                _ => return EDI,
            },
            other => other,
        };
        unreachable!("unhandled ?-register token {full}");
    }
    match token {
        "al" => AL,
        "cl" => CL,
        "dl" => DL,
        "bl" => BL,
        "ah" => AH,
        "ch" => CH,
        "dh" => DH,
        "bh" => BH,
        "ax" => AX,
        "cx" => CX,
        "dx" => DX,
        "bx" => BX,
        "sp" => SP,
        "bp" => BP,
        "si" => SI,
        "di" => DI,
        "eax" => EAX,
        "ecx" => ECX,
        "edx" => EDX,
        "ebx" => EBX,
        "esp" => ESP,
        "ebp" => EBP,
        "esi" => ESI,
        "edi" => EDI,
        "es" => ES,
        "cs" => CS,
        "ss" => SS,
        "ds" => DS,
        "fs" => FS,
        "gs" => GS,
        other => panic!("unknown literal register token {other}"),
    }
}
