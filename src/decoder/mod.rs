//! The x86 (IA-32) instruction decoder: reads a byte stream through an
//! [`OpcodeReader`], drives the dispatch tables, and produces a decoded
//! [`Instruction`] ready for [`printer::print_insn`].

pub mod instruction;
pub mod operand;
pub mod printer;
pub mod reader;
pub mod registers;
pub mod state;
mod tables;
pub mod width;

pub use instruction::{Instruction, OperandCode};
pub use operand::{Immediate, MemoryRef, Operand};
pub use reader::{OpcodeReader, SliceReader};
pub use registers::Register;
pub use state::{DecodeError, DecoderState, SegOverride};
pub use width::Width;

/// Decodes exactly one instruction from `reader`.
pub fn decode(reader: &mut dyn OpcodeReader) -> Result<Instruction, DecodeError> {
    let mut state = DecoderState::new(reader);
    tables::dispatch(&mut state)
}

/// Convenience wrapper over [`decode`] for an in-memory byte slice; returns
/// the instruction and the number of bytes it consumed.
pub fn decode_slice(bytes: &[u8]) -> Result<(Instruction, usize), DecodeError> {
    let mut reader = SliceReader::new(bytes);
    let insn = decode(&mut reader)?;
    Ok((insn, reader.consumed()))
}

#[cfg(test)]
mod tests {
    use super::printer::print_insn;
    use super::*;

    fn decode_and_print(bytes: &[u8], width: usize) -> String {
        let (insn, _) = decode_slice(bytes).expect("decode should succeed");
        print_insn(&insn, width)
    }

    #[test]
    fn add_byte_16bit_address_with_index_only() {
        assert_eq!(
            decode_and_print(&[0x67, 0x00, 0x44, 0x7F], 10),
            "add        byte ds:[si*1+7f], al"
        );
    }

    #[test]
    fn segment_override_combines_with_address_size_prefix() {
        assert_eq!(
            decode_and_print(&[0x26, 0x67, 0x00, 0x44, 0x7F], 10),
            "add        byte es:[si*1+7f], al"
        );
    }

    #[test]
    fn negative_displacement_prints_sign_and_nibble_width() {
        assert_eq!(
            decode_and_print(&[0x67, 0x00, 0x84, 0xFF, 0xFF], 10),
            "add        byte ds:[si*1-0001], al"
        );
    }

    #[test]
    fn lea_with_sib_base_esp() {
        assert_eq!(
            decode_and_print(&[0x8D, 0x44, 0x24, 0x10], 10),
            "lea        dword ss:[esp+10], eax"
        );
    }

    #[test]
    fn short_read_mid_instruction_is_an_error() {
        // `add Ev,Gv` (66-prefixed) needs a ModR/M byte that never arrives.
        let result = decode_slice(&[0x01]);
        assert_eq!(result.unwrap_err(), DecodeError::ShortRead);
    }

    #[test]
    fn unknown_opcode_does_not_panic() {
        // 0F 04 is reserved and unmapped in both tables.
        let result = decode_slice(&[0x0F, 0x04]);
        assert_eq!(result.unwrap_err(), DecodeError::InvalidOpcode);
    }

    #[test]
    fn lock_prefix_renders_before_mnemonic() {
        // `lock xadd dword ds:[ecx], eax` -- F0 0F C1 01
        let (insn, _) = decode_slice(&[0xF0, 0x0F, 0xC1, 0x01]).unwrap();
        assert!(insn.lock);
        assert_eq!(print_insn(&insn, 4), "lock xadd dword ds:[ecx], eax");
    }

    #[test]
    fn register_form_modrm_skips_memory_decoding() {
        let (insn, consumed) = decode_slice(&[0x01, 0xD8]).unwrap(); // add eax, ebx
        assert_eq!(consumed, 2);
        assert_eq!(insn.operands.len(), 2);
    }

    proptest::proptest! {
        #[test]
        fn decode_never_panics_on_arbitrary_bytes(bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 1..16)) {
            let _ = decode_slice(&bytes);
        }

        #[test]
        fn decode_is_deterministic(bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 1..16)) {
            let a = decode_slice(&bytes);
            let b = decode_slice(&bytes);
            match (a, b) {
                (Ok((ia, na)), Ok((ib, nb))) => {
                    proptest::prop_assert_eq!(na, nb);
                    proptest::prop_assert_eq!(ia.mnemonic, ib.mnemonic);
                    proptest::prop_assert_eq!(ia.operands.len(), ib.operands.len());
                }
                (Err(ea), Err(eb)) => proptest::prop_assert_eq!(ea, eb),
                _ => proptest::prop_assert!(false, "same input decoded differently across runs"),
            }
        }
    }
}
