//! The four literal decode-and-print scenarios from the testable-properties
//! list, exercised against the public decoder API. The dispatch-table and
//! operand-resolution units tests live beside `decoder::tables`/`operand`;
//! these are the end-to-end golden strings.

use metalbones::decoder::{decode_slice, printer::print_insn};

fn decode_and_print(bytes: &[u8], width: usize) -> String {
    let (insn, _) = decode_slice(bytes).expect("decode should succeed");
    print_insn(&insn, width)
}

#[test]
fn add_byte_16bit_address_with_index_only() {
    assert_eq!(decode_and_print(&[0x67, 0x00, 0x44, 0x7F], 10), "add        byte ds:[si*1+7f], al");
}

#[test]
fn segment_override_combines_with_address_size_prefix() {
    assert_eq!(decode_and_print(&[0x26, 0x67, 0x00, 0x44, 0x7F], 10), "add        byte es:[si*1+7f], al");
}

#[test]
fn negative_displacement_prints_sign_and_nibble_width() {
    assert_eq!(decode_and_print(&[0x67, 0x00, 0x84, 0xFF, 0xFF], 10), "add        byte ds:[si*1-0001], al");
}

#[test]
fn lea_with_sib_base_esp() {
    assert_eq!(decode_and_print(&[0x8D, 0x44, 0x24, 0x10], 10), "lea        dword ss:[esp+10], eax");
}

#[test]
fn group1_83_sign_extends_imm8_into_current_operand_width() {
    // `add eax, -1` via the 83/XX form: ModR/M C0 = mod=3,reg=0(add),rm=0(eax);
    // the imm8 0xFF sign-extends to the full 32-bit operand width (Isb), not
    // an unsigned byte immediate.
    assert_eq!(decode_and_print(&[0x83, 0xC0, 0xFF], 10), "add        eax, -00000001");
}

#[test]
fn group1_83_isb_sign_extends_into_16bit_operand_width_under_66_prefix() {
    // Same opcode under a `66` operand-size prefix: Isb must sign-extend to
    // the *current* (16-bit) operand width, not always to 32 bits.
    assert_eq!(decode_and_print(&[0x66, 0x83, 0xC0, 0xFF], 10), "add        ax, -0001");
}

#[test]
fn fpu_memory_operand_honors_address_size_prefix() {
    // `67` toggles address size to 16-bit before the FPU escape resolves its
    // memory operand; ModR/M 06 (mod=0,rm=110) is the 16-bit disp16-only
    // form, so this must read a 2-byte displacement, not a 4-byte one.
    assert_eq!(decode_and_print(&[0x67, 0xD9, 0x06, 0x34, 0x12], 10), "fld        dword ds:[1234]");
}
