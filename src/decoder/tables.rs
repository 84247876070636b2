//! Dispatch tables (C4): the 32-bit main opcode table, the `0F` escape
//! table, the ModR/M.reg groups it delegates to, and the legacy FPU escapes
//! `D8`-`DF`. Ported field-for-field from the reference opcode maps; the
//! groups and escapes the source leaves as stubs (6, 7, 10, 16, `0F38`,
//! `0F3A`) stay unknown here too. Groups 8 and 15 and the FPU escapes are
//! new: the source never filled them in, but this decoder needs them.

use super::instruction::{OperandCode::*, Template};
use super::state::{DecodeError, DecoderState, SegOverride};

#[derive(Clone, Copy)]
pub(crate) enum MainEntry {
    Insn(Template),
    Group(&'static [Option<Template>; 8]),
    SegOverride(SegOverride),
    OperandSizePrefix,
    AddressSizePrefix,
    LockPrefix,
    RepnePrefix,
    RepePrefix,
    Escape0F,
    Fpu(u8),
    Group15,
    Invalid,
}

const fn t(mnemonic: &'static str, operands: &'static [super::instruction::OperandCode]) -> MainEntry {
    MainEntry::Insn(Template::new(mnemonic, operands))
}

const EB_GB: &[super::instruction::OperandCode] = &[Eb, Gb];
const EV_GV: &[super::instruction::OperandCode] = &[Ev, Gv];
const GB_EB: &[super::instruction::OperandCode] = &[Gb, Eb];
const GV_EV: &[super::instruction::OperandCode] = &[Gv, Ev];
const AL_IB: &[super::instruction::OperandCode] = &[Fixed("al"), Ib];
const AX_IZ: &[super::instruction::OperandCode] = &[Fixed("?ax"), Iz];
const NONE: &[super::instruction::OperandCode] = &[];

// Group 1: 80/81/82/83 (reg selects the alu op; 82 is the same as 80).
const GROUP1_EB_IB: [Option<Template>; 8] = [
    Some(Template::new("add", &[Eb, Ib])),
    Some(Template::new("or", &[Eb, Ib])),
    Some(Template::new("adc", &[Eb, Ib])),
    Some(Template::new("sbb", &[Eb, Ib])),
    Some(Template::new("and", &[Eb, Ib])),
    Some(Template::new("sub", &[Eb, Ib])),
    Some(Template::new("xor", &[Eb, Ib])),
    Some(Template::new("cmp", &[Eb, Ib])),
];
const GROUP1_EV_IZ: [Option<Template>; 8] = [
    Some(Template::new("add", &[Ev, Iz])),
    Some(Template::new("or", &[Ev, Iz])),
    Some(Template::new("adc", &[Ev, Iz])),
    Some(Template::new("sbb", &[Ev, Iz])),
    Some(Template::new("and", &[Ev, Iz])),
    Some(Template::new("sub", &[Ev, Iz])),
    Some(Template::new("xor", &[Ev, Iz])),
    Some(Template::new("cmp", &[Ev, Iz])),
];
// 83/XX: the immediate is a sign-extended imm8 (Isb), not a plain unsigned Ib.
const GROUP1_EV_IB: [Option<Template>; 8] = [
    Some(Template::new("add", &[Ev, Isb])),
    Some(Template::new("or", &[Ev, Isb])),
    Some(Template::new("adc", &[Ev, Isb])),
    Some(Template::new("sbb", &[Ev, Isb])),
    Some(Template::new("and", &[Ev, Isb])),
    Some(Template::new("sub", &[Ev, Isb])),
    Some(Template::new("xor", &[Ev, Isb])),
    Some(Template::new("cmp", &[Ev, Isb])),
];

// Group 1A: 8F.
const GROUP1A: [Option<Template>; 8] = [
    Some(Template::new("pop", &[Ev])),
    None,
    None,
    None,
    None,
    None,
    None,
    None,
];

// Group 2: C0/C1/D0/D1/D2/D3 (reg selects the shift/rotate op).
const GROUP2_EB: [Option<Template>; 8] = [
    Some(Template::new("rol", &[Eb])),
    Some(Template::new("ror", &[Eb])),
    Some(Template::new("rcl", &[Eb])),
    Some(Template::new("rcr", &[Eb])),
    Some(Template::new("shl", &[Eb])),
    Some(Template::new("shr", &[Eb])),
    None,
    Some(Template::new("sar", &[Eb])),
];
const GROUP2_EV: [Option<Template>; 8] = [
    Some(Template::new("rol", &[Ev])),
    Some(Template::new("ror", &[Ev])),
    Some(Template::new("rcl", &[Ev])),
    Some(Template::new("rcr", &[Ev])),
    Some(Template::new("shl", &[Ev])),
    Some(Template::new("shr", &[Ev])),
    None,
    Some(Template::new("sar", &[Ev])),
];
const GROUP2_EB_IB: [Option<Template>; 8] = [
    Some(Template::new("rol", &[Eb, Ib])),
    Some(Template::new("ror", &[Eb, Ib])),
    Some(Template::new("rcl", &[Eb, Ib])),
    Some(Template::new("rcr", &[Eb, Ib])),
    Some(Template::new("shl", &[Eb, Ib])),
    Some(Template::new("shr", &[Eb, Ib])),
    None,
    Some(Template::new("sar", &[Eb, Ib])),
];
const GROUP2_EV_IB: [Option<Template>; 8] = [
    Some(Template::new("rol", &[Ev, Ib])),
    Some(Template::new("ror", &[Ev, Ib])),
    Some(Template::new("rcl", &[Ev, Ib])),
    Some(Template::new("rcr", &[Ev, Ib])),
    Some(Template::new("shl", &[Ev, Ib])),
    Some(Template::new("shr", &[Ev, Ib])),
    None,
    Some(Template::new("sar", &[Ev, Ib])),
];
const GROUP2_EB_CL: [Option<Template>; 8] = [
    Some(Template::new("rol", &[Eb, Fixed("cl")])),
    Some(Template::new("ror", &[Eb, Fixed("cl")])),
    Some(Template::new("rcl", &[Eb, Fixed("cl")])),
    Some(Template::new("rcr", &[Eb, Fixed("cl")])),
    Some(Template::new("shl", &[Eb, Fixed("cl")])),
    Some(Template::new("shr", &[Eb, Fixed("cl")])),
    None,
    Some(Template::new("sar", &[Eb, Fixed("cl")])),
];
const GROUP2_EV_CL: [Option<Template>; 8] = [
    Some(Template::new("rol", &[Ev, Fixed("cl")])),
    Some(Template::new("ror", &[Ev, Fixed("cl")])),
    Some(Template::new("rcl", &[Ev, Fixed("cl")])),
    Some(Template::new("rcr", &[Ev, Fixed("cl")])),
    Some(Template::new("shl", &[Ev, Fixed("cl")])),
    Some(Template::new("shr", &[Ev, Fixed("cl")])),
    None,
    Some(Template::new("sar", &[Ev, Fixed("cl")])),
];

// Group 3: F6/F7.
const GROUP3_EB: [Option<Template>; 8] = [
    Some(Template::new("test", &[Eb, Ib])),
    None,
    Some(Template::new("not", &[Eb])),
    Some(Template::new("neg", &[Eb])),
    Some(Template::new("mul", &[Eb])),
    Some(Template::new("imul", &[Eb])),
    Some(Template::new("div", &[Eb])),
    Some(Template::new("idiv", &[Eb])),
];
const GROUP3_EV: [Option<Template>; 8] = [
    Some(Template::new("test", &[Ev, Iz])),
    None,
    Some(Template::new("not", &[Ev])),
    Some(Template::new("neg", &[Ev])),
    Some(Template::new("mul", &[Ev])),
    Some(Template::new("imul", &[Ev])),
    Some(Template::new("div", &[Ev])),
    Some(Template::new("idiv", &[Ev])),
];

// Group 4: FE.
const GROUP4: [Option<Template>; 8] = [
    Some(Template::new("inc", &[Eb])),
    Some(Template::new("dec", &[Eb])),
    None,
    None,
    None,
    None,
    None,
    None,
];

// Group 5: FF.
const GROUP5: [Option<Template>; 8] = [
    Some(Template::new("inc", &[Ev])),
    Some(Template::new("dec", &[Ev])),
    Some(Template::new("call", &[Ev])),
    Some(Template::new("call", &[Ep])),
    Some(Template::new("jmp", &[Ev])),
    Some(Template::new("jmp", &[Mp])),
    Some(Template::new("push", &[Ev])),
    None,
];

// Group 8 (0F BA): bit-test family against `Ev, Ib`. Not filled in by the
// source; entries 0-3 are reserved per the ISA.
const GROUP8: [Option<Template>; 8] = [
    None,
    None,
    None,
    None,
    Some(Template::new("bt", &[Ev, Ib])),
    Some(Template::new("bts", &[Ev, Ib])),
    Some(Template::new("btr", &[Ev, Ib])),
    Some(Template::new("btc", &[Ev, Ib])),
];

// Group 11: C6/C7.
const GROUP11_EB_IB: [Option<Template>; 8] = [
    Some(Template::new("mov", &[Eb, Ib])),
    None,
    None,
    None,
    None,
    None,
    None,
    None,
];
const GROUP11_EV_IZ: [Option<Template>; 8] = [
    Some(Template::new("mov", &[Ev, Iz])),
    None,
    None,
    None,
    None,
    None,
    None,
    None,
];

// Group 15 (0F AE): FPU/MXCSR state management and the fence instructions.
// The memory-form entries take a dword-sized pointer operand (`Ev`); the
// fence instructions only exist in the register (mod==3) encoding and are
// resolved separately in `decode_group15`.
const GROUP15_MEM: [Option<Template>; 8] = [
    Some(Template::new("fxsave", &[Ev])),
    Some(Template::new("fxrstor", &[Ev])),
    Some(Template::new("ldmxcsr", &[Ev])),
    Some(Template::new("stmxcsr", &[Ev])),
    None,
    Some(Template::new("xsave", &[Ev])),
    Some(Template::new("xrstor", &[Ev])),
    Some(Template::new("clflush", &[Ev])),
];

pub(crate) fn decode_group15(state: &mut DecoderState) -> Result<super::instruction::Instruction, DecodeError> {
    let modrm = state.fetch_modrm()?;
    if modrm.md == 3 {
        let mnemonic = match (modrm.reg, modrm.rm) {
            (5, _) => "lfence",
            (6, _) => "mfence",
            (7, _) => "sfence",
            _ => return Err(DecodeError::UnknownOpcode),
        };
        return Template::new(mnemonic, &[]).decode(state);
    }
    match &GROUP15_MEM[modrm.reg as usize] {
        Some(tmpl) => tmpl.decode(state),
        None => Err(DecodeError::UnknownOpcode),
    }
}

const CMOVCC_OPS: &[super::instruction::OperandCode] = GV_EV;
const SETCC_OPS: &[super::instruction::OperandCode] = &[Eb];
const JCC_JZ_OPS: &[super::instruction::OperandCode] = &[Jz];
const JCC_JB_OPS: &[super::instruction::OperandCode] = &[Jb];

// The `cc` mnemonic family can't be built with `const fn` string
// concatenation, so each row below is spelled out rather than generated.
const CMOVCC_LOW: [MainEntry; 8] = [
    t("cmovo", CMOVCC_OPS),
    t("cmovno", CMOVCC_OPS),
    t("cmovb", CMOVCC_OPS),
    t("cmovae", CMOVCC_OPS),
    t("cmove", CMOVCC_OPS),
    t("cmovne", CMOVCC_OPS),
    t("cmovbe", CMOVCC_OPS),
    t("cmova", CMOVCC_OPS),
];
const CMOVCC_HIGH: [MainEntry; 8] = [
    t("cmovs", CMOVCC_OPS),
    t("cmovns", CMOVCC_OPS),
    t("cmovp", CMOVCC_OPS),
    t("cmovnp", CMOVCC_OPS),
    t("cmovl", CMOVCC_OPS),
    t("cmovge", CMOVCC_OPS),
    t("cmovle", CMOVCC_OPS),
    t("cmovg", CMOVCC_OPS),
];
const SETCC_LOW: [MainEntry; 8] = [
    t("seto", SETCC_OPS),
    t("setno", SETCC_OPS),
    t("setb", SETCC_OPS),
    t("setae", SETCC_OPS),
    t("sete", SETCC_OPS),
    t("setne", SETCC_OPS),
    t("setbe", SETCC_OPS),
    t("seta", SETCC_OPS),
];
const SETCC_HIGH: [MainEntry; 8] = [
    t("sets", SETCC_OPS),
    t("setns", SETCC_OPS),
    t("setp", SETCC_OPS),
    t("setnp", SETCC_OPS),
    t("setl", SETCC_OPS),
    t("setge", SETCC_OPS),
    t("setle", SETCC_OPS),
    t("setg", SETCC_OPS),
];
const JCC_JZ_LOW: [MainEntry; 8] = [
    t("jo", JCC_JZ_OPS),
    t("jno", JCC_JZ_OPS),
    t("jb", JCC_JZ_OPS),
    t("jae", JCC_JZ_OPS),
    t("je", JCC_JZ_OPS),
    t("jne", JCC_JZ_OPS),
    t("jbe", JCC_JZ_OPS),
    t("ja", JCC_JZ_OPS),
];
const JCC_JZ_HIGH: [MainEntry; 8] = [
    t("js", JCC_JZ_OPS),
    t("jns", JCC_JZ_OPS),
    t("jp", JCC_JZ_OPS),
    t("jnp", JCC_JZ_OPS),
    t("jl", JCC_JZ_OPS),
    t("jge", JCC_JZ_OPS),
    t("jle", JCC_JZ_OPS),
    t("jg", JCC_JZ_OPS),
];
const JCC_JB_LOW: [MainEntry; 8] = [
    t("jo", JCC_JB_OPS),
    t("jno", JCC_JB_OPS),
    t("jb", JCC_JB_OPS),
    t("jae", JCC_JB_OPS),
    t("je", JCC_JB_OPS),
    t("jne", JCC_JB_OPS),
    t("jbe", JCC_JB_OPS),
    t("ja", JCC_JB_OPS),
];
const JCC_JB_HIGH: [MainEntry; 8] = [
    t("js", JCC_JB_OPS),
    t("jns", JCC_JB_OPS),
    t("jp", JCC_JB_OPS),
    t("jnp", JCC_JB_OPS),
    t("jl", JCC_JB_OPS),
    t("jge", JCC_JB_OPS),
    t("jle", JCC_JB_OPS),
    t("jg", JCC_JB_OPS),
];

macro_rules! row8 {
    ($t:expr) => {
        [$t[0], $t[1], $t[2], $t[3], $t[4], $t[5], $t[6], $t[7]]
    };
}

pub(crate) static MAIN_TABLE: [Option<MainEntry>; 256] = build_main_table();
pub(crate) static ESCAPE_0F_TABLE: [Option<MainEntry>; 256] = build_0f_table();

const fn build_main_table() -> [Option<MainEntry>; 256] {
    let mut table: [Option<MainEntry>; 256] = [None; 256];
    macro_rules! set {
        ($idx:expr, $e:expr) => {
            table[$idx] = Some($e);
        };
    }

    // 00-07 add
    set!(0x00, t("add", EB_GB));
    set!(0x01, t("add", EV_GV));
    set!(0x02, t("add", GB_EB));
    set!(0x03, t("add", GV_EV));
    set!(0x04, t("add", AL_IB));
    set!(0x05, t("add", AX_IZ));
    set!(0x06, t("push", &[Fixed("es")]));
    set!(0x07, t("pop", &[Fixed("es")]));
    // 08-0F or / 0F escape
    set!(0x08, t("or", EB_GB));
    set!(0x09, t("or", EV_GV));
    set!(0x0A, t("or", GB_EB));
    set!(0x0B, t("or", GV_EV));
    set!(0x0C, t("or", AL_IB));
    set!(0x0D, t("or", AX_IZ));
    set!(0x0E, t("push", &[Fixed("cs")]));
    set!(0x0F, MainEntry::Escape0F);
    // 10-17 adc
    set!(0x10, t("adc", EB_GB));
    set!(0x11, t("adc", EV_GV));
    set!(0x12, t("adc", GB_EB));
    set!(0x13, t("adc", GV_EV));
    set!(0x14, t("adc", AL_IB));
    set!(0x15, t("adc", AX_IZ));
    set!(0x16, t("push", &[Fixed("ss")]));
    set!(0x17, t("pop", &[Fixed("ss")]));
    // 18-1F sbb
    set!(0x18, t("sbb", EB_GB));
    set!(0x19, t("sbb", EV_GV));
    set!(0x1A, t("sbb", GB_EB));
    set!(0x1B, t("sbb", GV_EV));
    set!(0x1C, t("sbb", AL_IB));
    set!(0x1D, t("sbb", AX_IZ));
    set!(0x1E, t("push", &[Fixed("ds")]));
    set!(0x1F, t("pop", &[Fixed("ds")]));
    // 20-27 and
    set!(0x20, t("and", EB_GB));
    set!(0x21, t("and", EV_GV));
    set!(0x22, t("and", GB_EB));
    set!(0x23, t("and", GV_EV));
    set!(0x24, t("and", AL_IB));
    set!(0x25, t("and", AX_IZ));
    set!(0x26, MainEntry::SegOverride(SegOverride::Es));
    set!(0x27, t("daa", NONE));
    // 28-2F sub
    set!(0x28, t("sub", EB_GB));
    set!(0x29, t("sub", EV_GV));
    set!(0x2A, t("sub", GB_EB));
    set!(0x2B, t("sub", GV_EV));
    set!(0x2C, t("sub", AL_IB));
    set!(0x2D, t("sub", AX_IZ));
    set!(0x2E, MainEntry::SegOverride(SegOverride::Cs));
    set!(0x2F, t("das", NONE));
    // 30-37 xor
    set!(0x30, t("xor", EB_GB));
    set!(0x31, t("xor", EV_GV));
    set!(0x32, t("xor", GB_EB));
    set!(0x33, t("xor", GV_EV));
    set!(0x34, t("xor", AL_IB));
    set!(0x35, t("xor", AX_IZ));
    set!(0x36, MainEntry::SegOverride(SegOverride::Ss));
    set!(0x37, t("aaa", NONE));
    // 38-3F cmp
    set!(0x38, t("cmp", EB_GB));
    set!(0x39, t("cmp", EV_GV));
    set!(0x3A, t("cmp", GB_EB));
    set!(0x3B, t("cmp", GV_EV));
    set!(0x3C, t("cmp", AL_IB));
    set!(0x3D, t("cmp", AX_IZ));
    set!(0x3E, MainEntry::SegOverride(SegOverride::Ds));
    set!(0x3F, t("aas", NONE));
    // 40-47 inc ?reg, 48-4F dec ?reg
    set!(0x40, t("inc", &[Fixed("?ax")]));
    set!(0x41, t("inc", &[Fixed("?cx")]));
    set!(0x42, t("inc", &[Fixed("?dx")]));
    set!(0x43, t("inc", &[Fixed("?bx")]));
    set!(0x44, t("inc", &[Fixed("?sp")]));
    set!(0x45, t("inc", &[Fixed("?bp")]));
    set!(0x46, t("inc", &[Fixed("?si")]));
    set!(0x47, t("inc", &[Fixed("?di")]));
    set!(0x48, t("dec", &[Fixed("?ax")]));
    set!(0x49, t("dec", &[Fixed("?cx")]));
    set!(0x4A, t("dec", &[Fixed("?dx")]));
    set!(0x4B, t("dec", &[Fixed("?bx")]));
    set!(0x4C, t("dec", &[Fixed("?sp")]));
    set!(0x4D, t("dec", &[Fixed("?bp")]));
    set!(0x4E, t("dec", &[Fixed("?si")]));
    set!(0x4F, t("dec", &[Fixed("?di")]));
    // 50-57 push ?reg, 58-5F pop ?reg
    set!(0x50, t("push", &[Fixed("?ax")]));
    set!(0x51, t("push", &[Fixed("?cx")]));
    set!(0x52, t("push", &[Fixed("?dx")]));
    set!(0x53, t("push", &[Fixed("?bx")]));
    set!(0x54, t("push", &[Fixed("?sp")]));
    set!(0x55, t("push", &[Fixed("?bp")]));
    set!(0x56, t("push", &[Fixed("?si")]));
    set!(0x57, t("push", &[Fixed("?di")]));
    set!(0x58, t("pop", &[Fixed("?ax")]));
    set!(0x59, t("pop", &[Fixed("?cx")]));
    set!(0x5A, t("pop", &[Fixed("?dx")]));
    set!(0x5B, t("pop", &[Fixed("?bx")]));
    set!(0x5C, t("pop", &[Fixed("?sp")]));
    set!(0x5D, t("pop", &[Fixed("?bp")]));
    set!(0x5E, t("pop", &[Fixed("?si")]));
    set!(0x5F, t("pop", &[Fixed("?di")]));
    // 60-67
    set!(0x60, t("pusha", NONE));
    set!(0x61, t("popa", NONE));
    set!(0x62, t("bound", &[Gv, Ma]));
    set!(0x63, t("arpl", &[Ew, Gw]));
    set!(0x64, MainEntry::SegOverride(SegOverride::Fs));
    set!(0x65, MainEntry::SegOverride(SegOverride::Gs));
    set!(0x66, MainEntry::OperandSizePrefix);
    set!(0x67, MainEntry::AddressSizePrefix);
    // 68-6F
    set!(0x68, t("push", &[Iz]));
    set!(0x69, t("imul", &[Gv, Ev, Iz]));
    set!(0x6A, t("push", &[Ib]));
    set!(0x6B, t("imul", &[Gv, Ev, Ib]));
    set!(0x6C, t("ins", &[Yb, Fixed("dx")]));
    set!(0x6D, t("ins", &[Yz, Fixed("dx")]));
    set!(0x6E, t("outs", &[Fixed("dx"), Xb]));
    set!(0x6F, t("outs", &[Fixed("dx"), Xz]));
    // 70-7F Jcc Jb
    {
        let low = row8!(JCC_JB_LOW);
        let high = row8!(JCC_JB_HIGH);
        let mut i = 0;
        while i < 8 {
            table[0x70 + i] = Some(low[i]);
            table[0x78 + i] = Some(high[i]);
            i += 1;
        }
    }
    // 80-87
    set!(0x80, MainEntry::Group(&GROUP1_EB_IB));
    set!(0x81, MainEntry::Group(&GROUP1_EV_IZ));
    set!(0x82, MainEntry::Group(&GROUP1_EB_IB));
    set!(0x83, MainEntry::Group(&GROUP1_EV_IB));
    set!(0x84, t("test", EB_GB));
    set!(0x85, t("test", EV_GV));
    set!(0x86, t("xchg", EB_GB));
    set!(0x87, t("xchg", EV_GV));
    // 88-8F
    set!(0x88, t("mov", EB_GB));
    set!(0x89, t("mov", EV_GV));
    set!(0x8A, t("mov", GB_EB));
    set!(0x8B, t("mov", GV_EV));
    set!(0x8C, t("mov", &[Ev, Sw]));
    // The source pairs this with a stubbed `Mv` second operand it never
    // filled in (flagged "TBD, docs not clear" there); `Gv` is what makes
    // this decode to a register destination at all, so that's what's used.
    set!(0x8D, t("lea", &[Ev, Gv]));
    set!(0x8E, t("mov", &[Sw, Ew]));
    set!(0x8F, MainEntry::Group(&GROUP1A));
    // 90-97
    set!(0x90, t("nop", NONE));
    set!(0x91, t("xchg", &[Fixed("?cx"), Fixed("?ax")]));
    set!(0x92, t("xchg", &[Fixed("?dx"), Fixed("?ax")]));
    set!(0x93, t("xchg", &[Fixed("?bx"), Fixed("?ax")]));
    set!(0x94, t("xchg", &[Fixed("?sp"), Fixed("?ax")]));
    set!(0x95, t("xchg", &[Fixed("?bp"), Fixed("?ax")]));
    set!(0x96, t("xchg", &[Fixed("?si"), Fixed("?ax")]));
    set!(0x97, t("xchg", &[Fixed("?di"), Fixed("?ax")]));
    // 98-9F
    set!(0x98, t("cwde", NONE));
    set!(0x99, t("cdq", NONE));
    set!(0x9A, t("callf", &[Ap]));
    set!(0x9B, t("wait", NONE));
    set!(0x9C, t("pushf", &[Fv]));
    set!(0x9D, t("popf", &[Fv]));
    set!(0x9E, t("sahf", NONE));
    set!(0x9F, t("lahf", NONE));
    // A0-A7
    set!(0xA0, t("mov", &[Fixed("al"), Ob]));
    set!(0xA1, t("mov", &[Fixed("?ax"), Ov]));
    set!(0xA2, t("mov", &[Ob, Fixed("al")]));
    set!(0xA3, t("mov", &[Ov, Fixed("?ax")]));
    set!(0xA4, t("movs", &[Yb, Xb]));
    set!(0xA5, t("movs", &[Yv, Xv]));
    set!(0xA6, t("cmps", &[Xb, Yb]));
    set!(0xA7, t("cmps", &[Xv, Yv]));
    // A8-AF
    set!(0xA8, t("test", AL_IB));
    set!(0xA9, t("test", AX_IZ));
    set!(0xAA, t("stos", &[Yb, Fixed("al")]));
    set!(0xAB, t("stos", &[Yv, Fixed("?ax")]));
    set!(0xAC, t("lods", &[Fixed("al"), Xb]));
    set!(0xAD, t("lods", &[Fixed("?ax"), Xv]));
    set!(0xAE, t("scas", &[Fixed("al"), Xb]));
    set!(0xAF, t("scas", &[Fixed("?ax"), Xv]));
    // B0-B7 mov r8, Ib
    set!(0xB0, t("mov", &[Fixed("al"), Ib]));
    set!(0xB1, t("mov", &[Fixed("cl"), Ib]));
    set!(0xB2, t("mov", &[Fixed("dl"), Ib]));
    set!(0xB3, t("mov", &[Fixed("bl"), Ib]));
    set!(0xB4, t("mov", &[Fixed("ah"), Ib]));
    set!(0xB5, t("mov", &[Fixed("ch"), Ib]));
    set!(0xB6, t("mov", &[Fixed("dh"), Ib]));
    set!(0xB7, t("mov", &[Fixed("bh"), Ib]));
    // B8-BF mov ?reg, Iv
    set!(0xB8, t("mov", &[Fixed("?ax"), Iv]));
    set!(0xB9, t("mov", &[Fixed("?cx"), Iv]));
    set!(0xBA, t("mov", &[Fixed("?dx"), Iv]));
    set!(0xBB, t("mov", &[Fixed("?bx"), Iv]));
    set!(0xBC, t("mov", &[Fixed("?sp"), Iv]));
    set!(0xBD, t("mov", &[Fixed("?bp"), Iv]));
    set!(0xBE, t("mov", &[Fixed("?si"), Iv]));
    set!(0xBF, t("mov", &[Fixed("?di"), Iv]));
    // C0-C7
    set!(0xC0, MainEntry::Group(&GROUP2_EB_IB));
    set!(0xC1, MainEntry::Group(&GROUP2_EV_IB));
    set!(0xC2, t("retn", &[Iw]));
    set!(0xC3, t("retn", NONE));
    set!(0xC4, t("les", &[Gz, Mp]));
    set!(0xC5, t("lds", &[Gz, Mp]));
    set!(0xC6, MainEntry::Group(&GROUP11_EB_IB));
    set!(0xC7, MainEntry::Group(&GROUP11_EV_IZ));
    // C8-CF
    set!(0xC8, t("enter", &[Iw, Ib]));
    set!(0xC9, t("leave", NONE));
    set!(0xCA, t("retf", &[Iw]));
    set!(0xCB, t("retf", NONE));
    set!(0xCC, t("int3", NONE));
    set!(0xCD, t("int", &[Ib]));
    set!(0xCE, t("into", NONE));
    set!(0xCF, t("iret", NONE));
    // D0-D3
    set!(0xD0, MainEntry::Group(&GROUP2_EB));
    set!(0xD1, MainEntry::Group(&GROUP2_EV));
    set!(0xD2, MainEntry::Group(&GROUP2_EB_CL));
    set!(0xD3, MainEntry::Group(&GROUP2_EV_CL));
    // D4-D7
    set!(0xD4, t("aam", &[Ib]));
    set!(0xD5, t("aad", &[Ib]));
    set!(0xD7, t("xlat", NONE));
    // D8-DF FPU escapes
    set!(0xD8, MainEntry::Fpu(0xD8));
    set!(0xD9, MainEntry::Fpu(0xD9));
    set!(0xDA, MainEntry::Fpu(0xDA));
    set!(0xDB, MainEntry::Fpu(0xDB));
    set!(0xDC, MainEntry::Fpu(0xDC));
    set!(0xDD, MainEntry::Fpu(0xDD));
    set!(0xDE, MainEntry::Fpu(0xDE));
    set!(0xDF, MainEntry::Fpu(0xDF));
    // E0-E7
    set!(0xE0, t("loopnz", &[Jb]));
    set!(0xE1, t("loopz", &[Jb]));
    set!(0xE2, t("loop", &[Jb]));
    set!(0xE3, t("jcxz", &[Jb]));
    set!(0xE4, t("in", &[Fixed("al"), Ib]));
    set!(0xE5, t("in", &[Fixed("?ax"), Ib]));
    set!(0xE6, t("out", &[Ib, Fixed("al")]));
    set!(0xE7, t("out", &[Ib, Fixed("?ax")]));
    // E8-EF
    set!(0xE8, t("call", &[Jz]));
    set!(0xE9, t("jmp", &[Jz]));
    set!(0xEA, t("jmp", &[Ap]));
    set!(0xEB, t("jmp", &[Jb]));
    set!(0xEC, t("in", &[Fixed("al"), Fixed("dx")]));
    set!(0xED, t("in", &[Fixed("?ax"), Fixed("dx")]));
    set!(0xEE, t("out", &[Fixed("dx"), Fixed("al")]));
    set!(0xEF, t("out", &[Fixed("dx"), Fixed("?ax")]));
    // F0-F7
    set!(0xF0, MainEntry::LockPrefix);
    set!(0xF2, MainEntry::RepnePrefix);
    set!(0xF3, MainEntry::RepePrefix);
    set!(0xF4, t("hlt", NONE));
    set!(0xF5, t("cmc", NONE));
    set!(0xF6, MainEntry::Group(&GROUP3_EB));
    set!(0xF7, MainEntry::Group(&GROUP3_EV));
    // F8-FF
    set!(0xF8, t("clc", NONE));
    set!(0xF9, t("stc", NONE));
    set!(0xFA, t("cli", NONE));
    set!(0xFB, t("sti", NONE));
    set!(0xFC, t("cld", NONE));
    set!(0xFD, t("std", NONE));
    set!(0xFE, MainEntry::Group(&GROUP4));
    set!(0xFF, MainEntry::Group(&GROUP5));

    table
}

const fn build_0f_table() -> [Option<MainEntry>; 256] {
    let mut table: [Option<MainEntry>; 256] = [None; 256];
    macro_rules! set {
        ($idx:expr, $e:expr) => {
            table[$idx] = Some($e);
        };
    }
    macro_rules! inv {
        ($idx:expr) => {
            table[$idx] = Some(MainEntry::Invalid);
        };
    }

    // 00-07: groups 6/7 unknown, lar/lsl real, syscall/sysret invalid (no long mode)
    set!(0x02, t("lar", &[Gv, Ew]));
    set!(0x03, t("lsl", &[Gv, Ew]));
    inv!(0x04);
    inv!(0x05);
    set!(0x06, t("clts", NONE));
    inv!(0x07);
    // 08-0F
    set!(0x08, t("invd", NONE));
    set!(0x09, t("wbinvd", NONE));
    inv!(0x0A);
    set!(0x0B, t("ud2", NONE));
    inv!(0x0C);
    set!(0x0D, t("prefetchw", &[Ev]));
    inv!(0x0E);
    inv!(0x0F);
    // 18-1F: group 16 unknown except nop Ev
    inv!(0x19);
    inv!(0x1A);
    inv!(0x1B);
    inv!(0x1C);
    inv!(0x1D);
    inv!(0x1E);
    set!(0x1F, t("nop", &[Ev]));
    // 20-23
    set!(0x20, t("mov", &[Rd, Cd]));
    set!(0x21, t("mov", &[Rd, Dd]));
    set!(0x22, t("mov", &[Cd, Rd]));
    set!(0x23, t("mov", &[Dd, Rd]));
    // 30-37
    set!(0x30, t("wrmsr", NONE));
    set!(0x31, t("rdtsc", NONE));
    set!(0x32, t("rdmsr", NONE));
    set!(0x33, t("rdpmc", NONE));
    set!(0x34, t("sysenter", NONE));
    set!(0x35, t("sysexit", NONE));
    set!(0x37, t("getsec", NONE));
    // 38/3A escapes unknown; 39/3B-3F invalid
    inv!(0x39);
    inv!(0x3B);
    inv!(0x3C);
    inv!(0x3D);
    inv!(0x3E);
    inv!(0x3F);
    // 40-4F cmovcc
    {
        let low = row8!(CMOVCC_LOW);
        let high = row8!(CMOVCC_HIGH);
        let mut i = 0;
        while i < 8 {
            table[0x40 + i] = Some(low[i]);
            table[0x48 + i] = Some(high[i]);
            i += 1;
        }
    }
    // 78-79
    set!(0x78, t("vmread", &[Ey, Gy]));
    set!(0x79, t("vmwrite", &[Gy, Ey]));
    // 80-8F Jcc Jz
    {
        let low = row8!(JCC_JZ_LOW);
        let high = row8!(JCC_JZ_HIGH);
        let mut i = 0;
        while i < 8 {
            table[0x80 + i] = Some(low[i]);
            table[0x88 + i] = Some(high[i]);
            i += 1;
        }
    }
    // 90-9F setcc
    {
        let low = row8!(SETCC_LOW);
        let high = row8!(SETCC_HIGH);
        let mut i = 0;
        while i < 8 {
            table[0x90 + i] = Some(low[i]);
            table[0x98 + i] = Some(high[i]);
            i += 1;
        }
    }
    // A0-A7
    set!(0xA0, t("push", &[Fixed("fs")]));
    set!(0xA1, t("pop", &[Fixed("fs")]));
    set!(0xA2, t("cpuid", NONE));
    set!(0xA3, t("bt", EV_GV));
    set!(0xA4, t("shld", &[Ev, Gv, Ib]));
    set!(0xA5, t("shld", &[Ev, Gv, Fixed("cl")]));
    // A8-AF
    set!(0xA8, t("push", &[Fixed("gs")]));
    set!(0xA9, t("pop", &[Fixed("gs")]));
    set!(0xAA, t("rsm", NONE));
    set!(0xAB, t("bts", EV_GV));
    set!(0xAC, t("shrd", &[Ev, Gv, Ib]));
    set!(0xAD, t("shrd", &[Ev, Gv, Fixed("cl")]));
    set!(0xAE, MainEntry::Group15);
    set!(0xAF, t("imul", GV_EV));
    // B0-B7
    set!(0xB0, t("cmpxchg", EB_GB));
    set!(0xB1, t("cmpxchg", EV_GV));
    set!(0xB2, t("lss", &[Gv, Mp]));
    set!(0xB3, t("btr", EV_GV));
    set!(0xB4, t("lfs", &[Gv, Mp]));
    set!(0xB5, t("lgs", &[Gv, Mp]));
    set!(0xB6, t("movzx", &[Gv, Eb]));
    set!(0xB7, t("movzx", &[Gv, Ew]));
    // B8-BF
    inv!(0xB8);
    set!(0xBA, MainEntry::Group(&GROUP8));
    set!(0xBB, t("btc", EV_GV));
    set!(0xBC, t("bsf", GV_EV));
    set!(0xBD, t("bsr", GV_EV));
    set!(0xBE, t("movsx", &[Gv, Eb]));
    set!(0xBF, t("movsx", &[Gv, Ew]));
    // C0-C7
    set!(0xC0, t("xadd", EB_GB));
    set!(0xC1, t("xadd", EV_GV));
    // C8-CF bswap ?reg
    set!(0xC8, t("bswap", &[Fixed("eax")]));
    set!(0xC9, t("bswap", &[Fixed("ecx")]));
    set!(0xCA, t("bswap", &[Fixed("edx")]));
    set!(0xCB, t("bswap", &[Fixed("ebx")]));
    set!(0xCC, t("bswap", &[Fixed("esp")]));
    set!(0xCD, t("bswap", &[Fixed("ebp")]));
    set!(0xCE, t("bswap", &[Fixed("esi")]));
    set!(0xCF, t("bswap", &[Fixed("edi")]));

    table
}

/// Legacy FPU escape decode (`D8`-`DF`). Not in the table this decoder is
/// ported from (left as stubs there); built here from the classic x87
/// ModR/M.reg layout: memory operands select one of eight ops by `reg`,
/// register-form operands (`mod==3`) address `ST(rm)` against `ST(0)`.
pub(crate) fn decode_fpu(state: &mut DecoderState, escape: u8) -> Result<super::instruction::Instruction, DecodeError> {
    let modrm = state.fetch_modrm()?;
    let mem_ops: [&str; 8] = match escape {
        0xD8 => ["fadd", "fmul", "fcom", "fcomp", "fsub", "fsubr", "fdiv", "fdivr"],
        0xD9 => ["fld", "fld", "fst", "fstp", "fldenv", "fldcw", "fnstenv", "fnstcw"],
        0xDA => ["fiadd", "fimul", "ficom", "ficomp", "fisub", "fisubr", "fidiv", "fidivr"],
        0xDB => ["fild", "fisttp", "fist", "fistp", "fild", "fild", "fstp", "fstp"],
        0xDC => ["fadd", "fmul", "fcom", "fcomp", "fsub", "fsubr", "fdiv", "fdivr"],
        0xDD => ["fld", "fisttp", "fst", "fstp", "frstor", "fld", "fnsave", "fnstsw"],
        0xDE => ["fiadd", "fimul", "ficom", "ficomp", "fisub", "fisubr", "fidiv", "fidivr"],
        0xDF => ["fild", "fisttp", "fist", "fistp", "fbld", "fild", "fbstp", "fistp"],
        _ => unreachable!("decode_fpu called with non-FPU-escape byte"),
    };
    let reg_ops: [&str; 8] = match escape {
        0xD8 => ["fadd", "fmul", "fcom", "fcomp", "fsub", "fsubr", "fdiv", "fdivr"],
        0xD9 => ["fld", "fxch", "fnop", "fstp", "fchs", "fabs", "ftst", "fxam"],
        0xDA => ["fcmovb", "fcmove", "fcmovbe", "fcmovu", "ficom", "ficomp", "fisub", "fisubr"],
        0xDB => ["fcmovnb", "fcmovne", "fcmovnbe", "fcmovnu", "fnop", "fucomi", "fcomi", "fistp"],
        0xDC => ["fadd", "fmul", "fcom", "fcomp", "fsubr", "fsub", "fdivr", "fdiv"],
        0xDD => ["ffree", "fisttp", "fst", "fstp", "fucom", "fucomp", "fnsave", "fnstsw"],
        0xDE => ["faddp", "fmulp", "fcomp", "fcompp", "fsubrp", "fsubp", "fdivrp", "fdivp"],
        0xDF => ["ffreep", "fisttp", "fstp", "fstp", "fnstsw", "fucomip", "fcomip", "fistp"],
        _ => unreachable!("decode_fpu called with non-FPU-escape byte"),
    };

    if modrm.md == 3 {
        let mnemonic = reg_ops[modrm.reg as usize];
        let st_rm = super::registers::ST_DECODE[modrm.rm as usize];
        let st0 = super::registers::ST_DECODE[0];
        let operands = vec![
            super::operand::Operand::register(st0),
            super::operand::Operand::register(st_rm),
        ];
        return Ok(super::instruction::Instruction {
            mnemonic,
            operands,
            lock: state.prefix_f0,
            repne: state.prefix_f2,
            repe: state.prefix_f3,
            seg_override: state.seg_override,
            opcode_hex: state.opcode_hex.clone(),
        });
    }

    let mnemonic = mem_ops[modrm.reg as usize];
    let width = match escape {
        0xD8 | 0xDA => super::width::Width::W32,
        0xD9 => super::width::Width::W32,
        0xDB | 0xDF => super::width::Width::W32,
        0xDC | 0xDD => super::width::Width::W64,
        _ => super::width::Width::W32,
    };
    // `Template::decode` applies this toggle before resolving operands; the
    // FPU path bypasses that, so a 67-prefixed FPU memory form needs it here.
    if state.prefix_67 {
        state.toggle_address_width();
    }
    let mem = state.decode_memory_ref(width)?;
    Ok(super::instruction::Instruction {
        mnemonic,
        operands: vec![super::operand::Operand::Memory(mem)],
        lock: state.prefix_f0,
        repne: state.prefix_f2,
        repe: state.prefix_f3,
        seg_override: state.seg_override,
        opcode_hex: state.opcode_hex.clone(),
    })
}

/// Entry point: drives the main table, following the `0F` escape and
/// legacy-prefix bytes, until a terminal instruction or FPU escape resolves.
pub fn dispatch(state: &mut DecoderState) -> Result<super::instruction::Instruction, DecodeError> {
    let mut table: &'static [Option<MainEntry>; 256] = &MAIN_TABLE;
    loop {
        let b = state.fetch_opcode()?;
        match &table[b as usize] {
            None => return Err(DecodeError::UnknownOpcode),
            Some(MainEntry::Invalid) => return Err(DecodeError::InvalidOpcode),
            Some(MainEntry::Insn(tmpl)) => return tmpl.decode(state),
            Some(MainEntry::Group(group)) => {
                let modrm = state.fetch_modrm()?;
                return match &group[modrm.reg as usize] {
                    None => Err(DecodeError::UnknownOpcode),
                    Some(tmpl) => tmpl.decode(state),
                };
            }
            Some(MainEntry::SegOverride(seg)) => {
                state.seg_override = Some(*seg);
            }
            Some(MainEntry::OperandSizePrefix) => {
                state.prefix_66 = true;
            }
            Some(MainEntry::AddressSizePrefix) => {
                state.prefix_67 = true;
            }
            Some(MainEntry::LockPrefix) => {
                state.prefix_f0 = true;
            }
            Some(MainEntry::RepnePrefix) => {
                state.prefix_f2 = true;
            }
            Some(MainEntry::RepePrefix) => {
                state.prefix_f3 = true;
            }
            Some(MainEntry::Escape0F) => {
                table = &ESCAPE_0F_TABLE;
            }
            Some(MainEntry::Fpu(escape)) => return decode_fpu(state, *escape),
            Some(MainEntry::Group15) => return decode_group15(state),
        }
    }
}
