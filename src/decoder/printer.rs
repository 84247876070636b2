//! Instruction Printer (C6): renders a decoded `Instruction` as Intel-syntax
//! text, mirroring the reference `Insn`/`MemoryRef`/`Immediate` string forms.

use super::instruction::Instruction;
use super::operand::{Immediate, MemoryRef, Operand};

/// Renders `insn` with its mnemonic (plus any `lock`/`repne`/`repe` prefix)
/// left-justified to at least `min_mnemonic_width` columns before the
/// operand list.
pub fn print_insn(insn: &Instruction, min_mnemonic_width: usize) -> String {
    let mut mnemonic = String::new();
    if insn.lock {
        mnemonic.push_str("lock ");
    }
    if insn.repne {
        mnemonic.push_str("repne ");
    }
    if insn.repe {
        mnemonic.push_str("repe ");
    }
    mnemonic.push_str(insn.mnemonic);

    let ops: Vec<String> = insn.operands.iter().map(format_operand).collect();
    format!("{:<width$} {}", mnemonic, ops.join(", "), width = min_mnemonic_width)
}

fn format_operand(op: &Operand) -> String {
    match op {
        Operand::Register(r) => r.name.to_string(),
        Operand::Immediate(imm) => format_immediate(imm),
        Operand::Memory(mem) => format_memory(mem),
        Operand::FarPointer { seg, off } => {
            format!("{}:{}", format_immediate(seg), format_immediate(off))
        }
    }
}

fn format_immediate(imm: &Immediate) -> String {
    let nibbles = (imm.width.bits() / 4) as usize;
    if imm.signed {
        let v = imm.as_signed();
        let (sign, mag) = if v < 0 { ("-", (-v) as u64) } else { ("+", v as u64) };
        format!("{sign}{mag:0nibbles$x}")
    } else {
        format!("{:0width$x}", imm.as_unsigned(), width = nibbles)
    }
}

fn format_memory(mem: &MemoryRef) -> String {
    let mut addr: Option<String> = mem.base.map(|b| b.name.to_string());

    if let Some(index) = mem.index {
        let term = format!("{}*{}", index.name, mem.scale);
        addr = Some(match addr {
            Some(a) => format!("{a}+{term}"),
            None => term,
        });
    }

    if let Some(disp) = mem.displacement {
        let nibbles = (disp.width.bits() / 4) as usize;
        let v = disp.as_signed();
        let negative = v < 0;
        let mag = if negative { (-v) as u64 } else { v as u64 };
        let hex = format!("{mag:0nibbles$x}");
        addr = Some(match addr {
            Some(a) => {
                if negative {
                    format!("{a}-{hex}")
                } else {
                    format!("{a}+{hex}")
                }
            }
            None => {
                if negative {
                    format!("-{hex}")
                } else {
                    hex
                }
            }
        });
    }

    let addr = addr.unwrap_or_default();
    format!("{} {}:[{}]", mem.width.display_name(), mem.seg.name, addr)
}
