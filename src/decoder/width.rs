//! Operand/address width bookkeeping shared across the decoder.

/// A concrete data width an operand can carry. Variant order mirrors the
/// `OPW_*` constants of the original `mcode` table (8/16/32/64/80/128/256/48)
/// so the discriminant doubles as the index used by the register-decode
/// tables in `registers.rs`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Width {
    W8,
    W16,
    W32,
    W64,
    W80,
    W128,
    W256,
    W48,
}

impl Width {
    pub fn bits(self) -> u32 {
        match self {
            Width::W8 => 8,
            Width::W16 => 16,
            Width::W32 => 32,
            Width::W64 => 64,
            Width::W80 => 80,
            Width::W128 => 128,
            Width::W256 => 256,
            Width::W48 => 48,
        }
    }

    /// Canonical Intel-syntax size name (`dword`, `qword`, ...).
    pub fn display_name(self) -> &'static str {
        match self {
            Width::W8 => "byte",
            Width::W16 => "word",
            Width::W32 => "dword",
            Width::W64 => "qword",
            Width::W80 => "tword",
            Width::W128 => "xmmword",
            Width::W256 => "ymmword",
            Width::W48 => "fword",
        }
    }
}

/// The two widths a 32-bit-mode decode can currently be operating under for
/// operand size and address size. Kept distinct from `Width` because only
/// these two ever toggle via the `66`/`67` prefixes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ToggleWidth {
    W16,
    W32,
}

impl ToggleWidth {
    pub fn toggled(self) -> Self {
        match self {
            ToggleWidth::W16 => ToggleWidth::W32,
            ToggleWidth::W32 => ToggleWidth::W16,
        }
    }

    pub fn as_width(self) -> Width {
        match self {
            ToggleWidth::W16 => Width::W16,
            ToggleWidth::W32 => Width::W32,
        }
    }
}

/// The byte counts `State::fetch_mp` understands; only 8/16/32-bit
/// immediates and displacements occur in the IA-32 encoding this decoder
/// targets.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FetchWidth {
    B8,
    B16,
    B32,
}

impl FetchWidth {
    pub fn as_width(self) -> Width {
        match self {
            FetchWidth::B8 => Width::W8,
            FetchWidth::B16 => Width::W16,
            FetchWidth::B32 => Width::W32,
        }
    }

    pub fn from_toggle(w: ToggleWidth) -> Self {
        match w {
            ToggleWidth::W16 => FetchWidth::B16,
            ToggleWidth::W32 => FetchWidth::B32,
        }
    }
}
