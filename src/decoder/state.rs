//! Decoder State (C2): accumulates everything a single instruction decode
//! needs across dispatch-table transitions -- fetched bytes, ModR/M/SIB
//! fields, active widths, legacy-prefix flags, segment override, and which
//! top-level dispatch node prefixes should re-enter.

use super::operand::{Immediate, MemoryRef};
use super::reader::OpcodeReader;
use super::registers::{self, Register};
use super::width::{FetchWidth, ToggleWidth, Width};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SegOverride {
    Es,
    Cs,
    Ss,
    Ds,
    Fs,
    Gs,
}

impl SegOverride {
    pub fn register(self) -> Register {
        match self {
            SegOverride::Es => registers::ES,
            SegOverride::Cs => registers::CS,
            SegOverride::Ss => registers::SS,
            SegOverride::Ds => registers::DS,
            SegOverride::Fs => registers::FS,
            SegOverride::Gs => registers::GS,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct ModRm {
    pub raw: u8,
    pub md: u8,
    pub reg: u8,
    pub rm: u8,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Sib {
    pub raw: u8,
    pub scale: u8,
    pub index: u8,
    pub base: u8,
}

/// Error raised while a single instruction is being decoded. See spec §4.8/§7.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The reader ran out of bytes mid-instruction.
    ShortRead,
    /// The opcode slot is reserved by the ISA and must not execute.
    InvalidOpcode,
    /// The opcode slot is not reserved, but this table doesn't decode it.
    UnknownOpcode,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::ShortRead => write!(f, "short read while decoding instruction"),
            DecodeError::InvalidOpcode => write!(f, "invalid opcode"),
            DecodeError::UnknownOpcode => write!(f, "unknown opcode"),
        }
    }
}

impl std::error::Error for DecodeError {}

pub struct DecoderState<'r> {
    reader: &'r mut dyn OpcodeReader,

    pub(crate) opcode_bytes: Vec<u8>,
    pub(crate) opcode_hex: String,

    pub(crate) modrm: Option<ModRm>,
    pub(crate) sib: Option<Sib>,
    pub(crate) displacement: Option<Immediate>,

    pub operand_width: ToggleWidth,
    pub address_width: ToggleWidth,

    pub seg_override: Option<SegOverride>,
    pub prefix_66: bool,
    pub prefix_67: bool,
    pub prefix_f0: bool,
    pub prefix_f2: bool,
    pub prefix_f3: bool,
}

impl<'r> DecoderState<'r> {
    pub fn new(reader: &'r mut dyn OpcodeReader) -> Self {
        DecoderState {
            reader,
            opcode_bytes: Vec::with_capacity(8),
            opcode_hex: String::with_capacity(16),
            modrm: None,
            sib: None,
            displacement: None,
            operand_width: ToggleWidth::W32,
            address_width: ToggleWidth::W32,
            seg_override: None,
            prefix_66: false,
            prefix_67: false,
            prefix_f0: false,
            prefix_f2: false,
            prefix_f3: false,
        }
    }

    /// Fetches and records the next opcode byte.
    pub(crate) fn fetch_opcode(&mut self) -> Result<u8, DecodeError> {
        let b = self.reader.read().ok_or(DecodeError::ShortRead)?;
        self.opcode_bytes.push(b);
        self.opcode_hex.push_str(&format!("{b:02x}"));
        Ok(b)
    }

    /// Idempotent: returns the already-fetched ModR/M byte on repeat calls.
    pub(crate) fn fetch_modrm(&mut self) -> Result<ModRm, DecodeError> {
        if let Some(m) = self.modrm {
            return Ok(m);
        }
        let raw = self.fetch_opcode()?;
        let m = ModRm {
            raw,
            md: raw >> 6,
            reg: (raw >> 3) & 0x07,
            rm: raw & 0x07,
        };
        self.modrm = Some(m);
        Ok(m)
    }

    /// Idempotent: returns the already-fetched SIB byte on repeat calls.
    pub(crate) fn fetch_sib(&mut self) -> Result<Sib, DecodeError> {
        if let Some(s) = self.sib {
            return Ok(s);
        }
        let raw = self.fetch_opcode()?;
        let s = Sib {
            raw,
            scale: raw >> 6,
            index: (raw >> 3) & 0x07,
            base: raw & 0x07,
        };
        self.sib = Some(s);
        Ok(s)
    }

    /// Reads 1, 2 or 4 bytes little-endian, zero-extended into a `u32`.
    pub fn fetch_mp(&mut self, width: FetchWidth) -> Result<u32, DecodeError> {
        let b0 = self.fetch_opcode()? as u32;
        let mut value = b0;
        if matches!(width, FetchWidth::B16 | FetchWidth::B32) {
            let b1 = self.fetch_opcode()? as u32;
            value |= b1 << 8;
        }
        if matches!(width, FetchWidth::B32) {
            let b2 = self.fetch_opcode()? as u32;
            let b3 = self.fetch_opcode()? as u32;
            value |= b2 << 16;
            value |= b3 << 24;
        }
        Ok(value)
    }

    pub(crate) fn modrm_unchecked(&self) -> ModRm {
        self.modrm.expect("modrm_unchecked called before fetch_modrm")
    }

    pub(crate) fn sib_unchecked(&self) -> Sib {
        self.sib.expect("sib_unchecked called before fetch_sib")
    }

    pub fn toggle_operand_width(&mut self) {
        self.operand_width = self.operand_width.toggled();
    }

    pub fn toggle_address_width(&mut self) {
        self.address_width = self.address_width.toggled();
    }

    /// §4.3-Mem: builds the `MemoryRef` for the current ModR/M (and SIB, if
    /// fetched) fields, for the given access width.
    pub(crate) fn decode_memory_ref(&mut self, width: Width) -> Result<MemoryRef, DecodeError> {
        let modrm = self.modrm_unchecked();
        match self.address_width {
            ToggleWidth::W16 => self.decode_memory_ref_16(width, modrm),
            ToggleWidth::W32 => self.decode_memory_ref_32(width, modrm),
        }
    }

    fn decode_memory_ref_16(
        &mut self,
        width: Width,
        modrm: ModRm,
    ) -> Result<MemoryRef, DecodeError> {
        use registers::{BP, BX, SI};
        // (base, index, default_seg, displacement width index: 0=none,1=disp8,2=disp16)
        //
        // rm==5 reuses the `si` index rather than `di` at every mod: this
        // mirrors the lookup table this decoder is ported from exactly,
        // quirk included, rather than the general IA-32 encoding.
        const TABLE: [(Option<Register>, Option<Register>, SegOverride, u8); 24] = [
            (Some(BX), Some(SI), SegOverride::Ds, 0),
            (Some(BX), Some(registers::DI), SegOverride::Ds, 0),
            (Some(BP), Some(SI), SegOverride::Ss, 0),
            (Some(BP), Some(registers::DI), SegOverride::Ss, 0),
            (None, Some(SI), SegOverride::Ds, 0),
            (None, Some(SI), SegOverride::Ds, 0),
            (None, None, SegOverride::Ds, 2), // disp16, no base
            (Some(BX), None, SegOverride::Ds, 0),
            (Some(BX), Some(SI), SegOverride::Ds, 1),
            (Some(BX), Some(registers::DI), SegOverride::Ds, 1),
            (Some(BP), Some(SI), SegOverride::Ss, 1),
            (Some(BP), Some(registers::DI), SegOverride::Ss, 1),
            (None, Some(SI), SegOverride::Ds, 1),
            (None, Some(SI), SegOverride::Ds, 1),
            (Some(BP), None, SegOverride::Ss, 1),
            (Some(BX), None, SegOverride::Ds, 1),
            (Some(BX), Some(SI), SegOverride::Ds, 2),
            (Some(BX), Some(registers::DI), SegOverride::Ds, 2),
            (Some(BP), Some(SI), SegOverride::Ss, 2),
            (Some(BP), Some(registers::DI), SegOverride::Ss, 2),
            (None, Some(SI), SegOverride::Ds, 2),
            (None, Some(SI), SegOverride::Ds, 2),
            (Some(BP), None, SegOverride::Ss, 2),
            (Some(BX), None, SegOverride::Ds, 2),
        ];
        let idx = ((modrm.md << 3) | modrm.rm) as usize;
        let (base, index, default_seg, disp_kind) = TABLE[idx];
        let displacement = match disp_kind {
            0 => None,
            1 => Some(self.fetch_displacement(FetchWidth::B8)?),
            2 => Some(self.fetch_displacement(FetchWidth::B16)?),
            _ => unreachable!(),
        };
        let seg = self
            .seg_override
            .map(SegOverride::register)
            .unwrap_or(default_seg.register());
        Ok(MemoryRef {
            width,
            seg,
            base,
            index,
            scale: 1,
            displacement,
        })
    }

    fn decode_memory_ref_32(
        &mut self,
        width: Width,
        modrm: ModRm,
    ) -> Result<MemoryRef, DecodeError> {
        use registers::R32_DECODE;
        // (base, default_seg, displacement kind: 0=none,1=disp8,2=disp32); rm==4 means SIB.
        const TABLE: [(Option<Register>, SegOverride, u8); 24] = [
            (Some(R32_DECODE[0]), SegOverride::Ds, 0),
            (Some(R32_DECODE[1]), SegOverride::Ds, 0),
            (Some(R32_DECODE[2]), SegOverride::Ds, 0),
            (Some(R32_DECODE[3]), SegOverride::Ds, 0),
            (None, SegOverride::Ds, 0), // SIB
            (None, SegOverride::Ds, 2), // disp32, no base
            (Some(R32_DECODE[6]), SegOverride::Ds, 0),
            (Some(R32_DECODE[7]), SegOverride::Ds, 0),
            (Some(R32_DECODE[0]), SegOverride::Ds, 1),
            (Some(R32_DECODE[1]), SegOverride::Ds, 1),
            (Some(R32_DECODE[2]), SegOverride::Ds, 1),
            (Some(R32_DECODE[3]), SegOverride::Ds, 1),
            (None, SegOverride::Ds, 1), // SIB
            (Some(R32_DECODE[5]), SegOverride::Ss, 1),
            (Some(R32_DECODE[6]), SegOverride::Ds, 1),
            (Some(R32_DECODE[7]), SegOverride::Ds, 1),
            (Some(R32_DECODE[0]), SegOverride::Ds, 2),
            (Some(R32_DECODE[1]), SegOverride::Ds, 2),
            (Some(R32_DECODE[2]), SegOverride::Ds, 2),
            (Some(R32_DECODE[3]), SegOverride::Ds, 2),
            (None, SegOverride::Ds, 2), // SIB
            (Some(R32_DECODE[5]), SegOverride::Ss, 2),
            (Some(R32_DECODE[6]), SegOverride::Ds, 2),
            (Some(R32_DECODE[7]), SegOverride::Ds, 2),
        ];
        let idx = ((modrm.md << 3) | modrm.rm) as usize;

        if modrm.rm == 4 {
            return self.decode_sib_ref(width, modrm);
        }

        let (base, default_seg, disp_kind) = TABLE[idx];
        let displacement = match disp_kind {
            0 => None,
            1 => Some(self.fetch_displacement(FetchWidth::B8)?),
            2 => Some(self.fetch_displacement(FetchWidth::B32)?),
            _ => unreachable!(),
        };
        let seg = self
            .seg_override
            .map(SegOverride::register)
            .unwrap_or(default_seg.register());
        Ok(MemoryRef {
            width,
            seg,
            base,
            index: None,
            scale: 1,
            displacement,
        })
    }

    fn decode_sib_ref(&mut self, width: Width, modrm: ModRm) -> Result<MemoryRef, DecodeError> {
        use registers::R32_DECODE;
        const SIB_INDEX: [Option<Register>; 8] = [
            Some(R32_DECODE[0]),
            Some(R32_DECODE[1]),
            Some(R32_DECODE[2]),
            Some(R32_DECODE[3]),
            None, // no index
            Some(R32_DECODE[5]),
            Some(R32_DECODE[6]),
            Some(R32_DECODE[7]),
        ];
        const SIB_DEFAULT_SEG: [SegOverride; 8] = [
            SegOverride::Ds,
            SegOverride::Ds,
            SegOverride::Ds,
            SegOverride::Ds,
            SegOverride::Ss,
            SegOverride::Ss,
            SegOverride::Ds,
            SegOverride::Ds,
        ];

        let sib = self.fetch_sib()?;
        let scale = 1u8 << sib.scale;
        let index = SIB_INDEX[sib.index as usize];

        let no_base = modrm.md == 0 && sib.base == 5;
        let (base, default_seg) = if no_base {
            (None, SIB_DEFAULT_SEG[0])
        } else {
            (Some(R32_DECODE[sib.base as usize]), SIB_DEFAULT_SEG[sib.base as usize])
        };

        let displacement = if no_base {
            Some(self.fetch_displacement(FetchWidth::B32)?)
        } else {
            match modrm.md {
                1 => Some(self.fetch_displacement(FetchWidth::B8)?),
                2 => Some(self.fetch_displacement(FetchWidth::B32)?),
                _ => None,
            }
        };

        let seg = self
            .seg_override
            .map(SegOverride::register)
            .unwrap_or(default_seg.register());

        Ok(MemoryRef {
            width,
            seg,
            base,
            index,
            scale,
            displacement,
        })
    }

    /// 8-bit displacements are always sign-extended when added; the
    /// full-width displacement is carried as a signed `Immediate` (it is
    /// only ever fetched when a base or index accompanies it, or as the
    /// bare `[disp16]`/`[disp32]` forms, which this decoder still marks
    /// signed per spec §4.3).
    fn fetch_displacement(&mut self, width: FetchWidth) -> Result<Immediate, DecodeError> {
        let raw = self.fetch_mp(width)? as u64;
        Ok(Immediate::new(raw, width.as_width(), true))
    }
}
