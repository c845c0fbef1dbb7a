use serde::{Deserialize, Serialize};

/// Language driver ids stored at byte 29 of the table header.
///
/// Ids that are not listed are preserved through `Other` so that a header
/// read from disk is written back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Codepage {
    #[default]
    Undefined,
    Cp437,
    Cp850,
    Cp1252,
    MacRoman,
    Cp865,
    Cp852,
    Cp866,
    Cp861,
    Cp895,
    Cp620,
    Cp737,
    Cp857,
    Cp950,
    Cp949,
    Cp936,
    Cp932,
    Cp874,
    Cp1255,
    Cp1256,
    Cp1250,
    Cp1251,
    Cp1254,
    Cp1253,
    Cp1257,
    Other(u8),
}

const REGISTRY: &[(Codepage, u8, u16)] = &[
    (Codepage::Cp437, 0x01, 437),
    (Codepage::Cp850, 0x02, 850),
    (Codepage::Cp1252, 0x03, 1252),
    (Codepage::MacRoman, 0x04, 10000),
    (Codepage::Cp865, 0x66, 865),
    (Codepage::Cp852, 0x64, 852),
    (Codepage::Cp866, 0x65, 866),
    (Codepage::Cp861, 0x67, 861),
    (Codepage::Cp895, 0x68, 895),
    (Codepage::Cp620, 0x69, 620),
    (Codepage::Cp737, 0x6A, 737),
    (Codepage::Cp857, 0x6B, 857),
    (Codepage::Cp950, 0x78, 950),
    (Codepage::Cp949, 0x79, 949),
    (Codepage::Cp936, 0x7A, 936),
    (Codepage::Cp932, 0x7B, 932),
    (Codepage::Cp874, 0x7C, 874),
    (Codepage::Cp1255, 0x7D, 1255),
    (Codepage::Cp1256, 0x7E, 1256),
    (Codepage::Cp1250, 0xC8, 1250),
    (Codepage::Cp1251, 0xC9, 1251),
    (Codepage::Cp1254, 0xCA, 1254),
    (Codepage::Cp1253, 0xCB, 1253),
    (Codepage::Cp1257, 0xCC, 1257),
];

impl Codepage {
    pub fn from_id(id: u8) -> Self {
        if id == 0 {
            return Codepage::Undefined;
        }
        REGISTRY
            .iter()
            .find(|(_, entry_id, _)| *entry_id == id)
            .map(|(codepage, _, _)| *codepage)
            .unwrap_or(Codepage::Other(id))
    }

    pub fn id(self) -> u8 {
        match self {
            Codepage::Undefined => 0,
            Codepage::Other(id) => id,
            known => REGISTRY
                .iter()
                .find(|(codepage, _, _)| *codepage == known)
                .map(|(_, id, _)| *id)
                .unwrap_or(0),
        }
    }

    /// Windows/DOS code page number, when known.
    pub fn code_page_number(self) -> Option<u16> {
        REGISTRY
            .iter()
            .find(|(codepage, _, _)| *codepage == self)
            .map(|(_, _, number)| *number)
    }
}
