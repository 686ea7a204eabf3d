//! Fixed-size binary slot format for the file backend.
//!
//! Every record occupies one slot of [`SLOT_SIZE`] bytes. A slot is a status
//! word followed by the encoded record body. All integers are little-endian.
//!
//! ```text
//! offset  size  field
//! ------  ----  ---------------------------------------------
//!      0     2  status word (bit 0b0100 = tombstone)
//!      2     4  id (u32)
//!      6   120  first name, UTF-8, NUL-padded
//!    126   120  last name, UTF-8, NUL-padded
//!    246     4  birth year (i32)
//!    250     4  birth month (u32, 1-12)
//!    254     4  birth day (u32, 1-31)
//!    258     2  dependents (u16)
//!    260     8  income in minor units (i64)
//!    268     4  gender code (u32 Unicode scalar)
//! ------  ----
//!    272        total
//! ```
//!
//! Names longer than [`NAME_CAPACITY`] bytes are truncated at the last whole
//! character that fits. Decoding strips the trailing NUL padding.

use std::str::Utf8Error;

use bytes::{Buf, BufMut};
use cabinet_core::{Gender, Income, Record};
use chrono::{Datelike, NaiveDate};

/// Capacity of each name buffer in bytes.
pub const NAME_CAPACITY: usize = 120;

/// Size of the status word in bytes.
pub const STATUS_SIZE: usize = 2;

/// Size of one slot in bytes.
pub const SLOT_SIZE: usize = STATUS_SIZE + 4 + NAME_CAPACITY * 2 + 4 * 3 + 2 + 8 + 4;

/// Slot size as a file offset stride.
pub const SLOT_STRIDE: u64 = SLOT_SIZE as u64;

/// Status word stored at the start of every slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotStatus(u16);

impl SlotStatus {
    /// Flag marking a slot as logically deleted.
    pub const TOMBSTONE_FLAG: u16 = 0b0100;

    /// Status of a freshly written slot.
    pub const LIVE: Self = Self(0);

    /// Wraps a raw status word.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Whether the tombstone flag is set.
    #[must_use]
    pub const fn is_tombstone(self) -> bool {
        self.0 & Self::TOMBSTONE_FLAG != 0
    }

    /// Returns this status with the tombstone flag set. Other bits are kept.
    #[must_use]
    pub const fn with_tombstone(self) -> Self {
        Self(self.0 | Self::TOMBSTONE_FLAG)
    }

    /// Encodes the status word.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; STATUS_SIZE] {
        self.0.to_le_bytes()
    }
}

/// Errors decoding a slot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("invalid slot length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("invalid date of birth {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },
    #[error("invalid gender code {0:#x}")]
    InvalidGender(u32),
    #[error("name is not valid UTF-8: {0}")]
    InvalidName(#[from] Utf8Error),
}

/// Truncates `value` to at most [`NAME_CAPACITY`] bytes on a character boundary.
#[must_use]
pub fn truncate_name(value: &str) -> &str {
    if value.len() <= NAME_CAPACITY {
        return value;
    }
    let mut end = NAME_CAPACITY;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Returns the record exactly as it will read back after a round trip
/// through the slot format.
#[must_use]
pub fn stored_form(record: &Record) -> Record {
    let fit = |name: &str| truncate_name(name).trim_end_matches('\0').to_string();
    Record {
        first_name: fit(&record.first_name),
        last_name: fit(&record.last_name),
        ..record.clone()
    }
}

fn put_name(buf: &mut impl BufMut, value: &str) {
    let bytes = truncate_name(value).as_bytes();
    buf.put_slice(bytes);
    buf.put_bytes(0, NAME_CAPACITY - bytes.len());
}

fn get_name(buf: &mut impl Buf) -> Result<String, CodecError> {
    let mut raw = [0u8; NAME_CAPACITY];
    buf.copy_to_slice(&mut raw);
    let end = raw.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    Ok(std::str::from_utf8(&raw[..end])?.to_string())
}

/// Encodes a record into a slot with the given status.
#[must_use]
pub fn encode(status: SlotStatus, record: &Record) -> [u8; SLOT_SIZE] {
    let mut slot = [0u8; SLOT_SIZE];
    let mut buf = &mut slot[..];
    buf.put_u16_le(status.bits());
    buf.put_u32_le(record.id);
    put_name(&mut buf, &record.first_name);
    put_name(&mut buf, &record.last_name);
    buf.put_i32_le(record.date_of_birth.year());
    buf.put_u32_le(record.date_of_birth.month());
    buf.put_u32_le(record.date_of_birth.day());
    buf.put_u16_le(record.dependents);
    buf.put_i64_le(record.income.minor_units());
    buf.put_u32_le(u32::from(record.gender.code()));
    debug_assert!(buf.is_empty(), "slot layout must fill SLOT_SIZE exactly");
    slot
}

/// Reads only the status word of a slot (or of any buffer starting with one).
///
/// # Errors
///
/// Returns [`CodecError::InvalidLength`] if `bytes` is shorter than the status word.
pub fn read_status(bytes: &[u8]) -> Result<SlotStatus, CodecError> {
    if bytes.len() < STATUS_SIZE {
        return Err(CodecError::InvalidLength {
            expected: STATUS_SIZE,
            actual: bytes.len(),
        });
    }
    Ok(SlotStatus(u16::from_le_bytes([bytes[0], bytes[1]])))
}

/// Decodes a slot into its status word and record.
///
/// # Errors
///
/// Returns a [`CodecError`] if the buffer is not exactly one slot long or
/// holds an impossible date, gender code or name encoding.
pub fn decode(bytes: &[u8]) -> Result<(SlotStatus, Record), CodecError> {
    if bytes.len() != SLOT_SIZE {
        return Err(CodecError::InvalidLength {
            expected: SLOT_SIZE,
            actual: bytes.len(),
        });
    }
    let mut buf = bytes;
    let status = SlotStatus(buf.get_u16_le());
    let id = buf.get_u32_le();
    let first_name = get_name(&mut buf)?;
    let last_name = get_name(&mut buf)?;
    let year = buf.get_i32_le();
    let month = buf.get_u32_le();
    let day = buf.get_u32_le();
    let date_of_birth = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(CodecError::InvalidDate { year, month, day })?;
    let dependents = buf.get_u16_le();
    let income = Income::from_minor_units(buf.get_i64_le());
    let code = buf.get_u32_le();
    let gender = char::from_u32(code).ok_or(CodecError::InvalidGender(code))?;

    Ok((
        status,
        Record {
            id,
            first_name,
            last_name,
            date_of_birth,
            dependents,
            income,
            gender: Gender::new(gender),
        },
    ))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn make_record() -> Record {
        Record {
            id: 17,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1815, 12, 10).unwrap(),
            dependents: 3,
            income: Income::from_minor_units(123_456),
            gender: Gender::new('F'),
        }
    }

    #[test]
    fn slot_size_matches_layout() {
        assert_eq!(SLOT_SIZE, 272);
    }

    #[test]
    fn encode_decode_round_trip() {
        let record = make_record();
        let slot = encode(SlotStatus::LIVE, &record);
        let (status, decoded) = decode(&slot).unwrap();
        assert_eq!(status, SlotStatus::LIVE);
        assert_eq!(decoded, record);
    }

    #[test]
    fn fields_land_at_documented_offsets() {
        let slot = encode(SlotStatus::LIVE, &make_record());
        assert_eq!(&slot[0..2], &[0, 0]);
        assert_eq!(&slot[2..6], &17u32.to_le_bytes());
        assert_eq!(&slot[6..9], b"Ada");
        assert!(slot[9..126].iter().all(|b| *b == 0));
        assert_eq!(&slot[126..134], b"Lovelace");
        assert_eq!(&slot[246..250], &1815i32.to_le_bytes());
        assert_eq!(&slot[250..254], &12u32.to_le_bytes());
        assert_eq!(&slot[254..258], &10u32.to_le_bytes());
        assert_eq!(&slot[258..260], &3u16.to_le_bytes());
        assert_eq!(&slot[260..268], &123_456i64.to_le_bytes());
        assert_eq!(&slot[268..272], &u32::from('F').to_le_bytes());
    }

    #[test]
    fn tombstone_flag_survives_encoding() {
        let status = SlotStatus::LIVE.with_tombstone();
        assert!(status.is_tombstone());
        assert_eq!(status.bits(), 0b0100);
        let slot = encode(status, &make_record());
        assert!(read_status(&slot).unwrap().is_tombstone());
        let (decoded_status, _) = decode(&slot).unwrap();
        assert!(decoded_status.is_tombstone());
    }

    #[test]
    fn tombstone_keeps_other_status_bits() {
        let status = SlotStatus::from_bits(0b0001).with_tombstone();
        assert_eq!(status.bits(), 0b0101);
        assert!(!SlotStatus::from_bits(0b0011).is_tombstone());
    }

    #[test]
    fn long_names_are_truncated_not_overflowed() {
        let mut record = make_record();
        record.first_name = "A".repeat(NAME_CAPACITY + 30);
        record.last_name = "Smith".to_string();
        let slot = encode(SlotStatus::LIVE, &record);
        let (_, decoded) = decode(&slot).unwrap();
        assert_eq!(decoded.first_name, "A".repeat(NAME_CAPACITY));
        assert_eq!(decoded.last_name, "Smith");
        assert_eq!(decoded, stored_form(&record));
    }

    #[test]
    fn truncation_never_splits_a_character() {
        // Two-byte characters: capacity is even, so put one ASCII byte first.
        let name = format!("x{}", "é".repeat(NAME_CAPACITY));
        let truncated = truncate_name(&name);
        assert!(truncated.len() <= NAME_CAPACITY);
        assert_eq!(truncated.len(), NAME_CAPACITY - 1);
        assert!(truncated.ends_with('é'));
    }

    #[test]
    fn name_exactly_at_capacity_is_kept() {
        let name = "z".repeat(NAME_CAPACITY);
        assert_eq!(truncate_name(&name), name);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let err = decode(&[0u8; SLOT_SIZE - 1]).unwrap_err();
        assert_eq!(
            err,
            CodecError::InvalidLength {
                expected: SLOT_SIZE,
                actual: SLOT_SIZE - 1
            }
        );
        assert!(read_status(&[0u8]).is_err());
    }

    #[test]
    fn decode_rejects_impossible_date() {
        let mut slot = encode(SlotStatus::LIVE, &make_record());
        slot[250..254].copy_from_slice(&13u32.to_le_bytes());
        assert!(matches!(
            decode(&slot),
            Err(CodecError::InvalidDate { month: 13, .. })
        ));
    }

    #[test]
    fn decode_rejects_invalid_gender_code() {
        let mut slot = encode(SlotStatus::LIVE, &make_record());
        slot[268..272].copy_from_slice(&0xD800u32.to_le_bytes());
        assert_eq!(decode(&slot), Err(CodecError::InvalidGender(0xD800)));
    }

    #[test]
    fn decode_rejects_invalid_utf8_name() {
        let mut slot = encode(SlotStatus::LIVE, &make_record());
        slot[6] = 0xFF;
        assert!(matches!(decode(&slot), Err(CodecError::InvalidName(_))));
    }

    #[test]
    fn all_zero_slot_is_not_a_valid_record() {
        // Year 0, month 0 is not a date.
        assert!(decode(&[0u8; SLOT_SIZE]).is_err());
    }

    fn arb_record() -> impl Strategy<Value = Record> {
        (
            1u32..u32::MAX,
            "[A-Za-zÀ-ÿ' -]{1,40}",
            "[A-Za-zÀ-ÿ' -]{1,40}",
            (1900i32..2100, 1u32..=12, 1u32..=28),
            any::<u16>(),
            0i64..1_000_000_000,
            prop::sample::select(vec!['M', 'F', 'N', 'm', 'f']),
        )
            .prop_map(|(id, first, last, (y, m, d), dependents, income, gender)| Record {
                id,
                first_name: first,
                last_name: last,
                date_of_birth: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
                dependents,
                income: Income::from_minor_units(income),
                gender: Gender::new(gender),
            })
    }

    proptest! {
        #[test]
        fn round_trip_law(record in arb_record()) {
            let slot = encode(SlotStatus::LIVE, &record);
            let (status, decoded) = decode(&slot).unwrap();
            prop_assert!(!status.is_tombstone());
            prop_assert_eq!(decoded, record);
        }

        #[test]
        fn stored_form_predicts_decoding(name in "\\PC{0,200}") {
            let mut record = make_record();
            record.first_name = name;
            let (_, decoded) = decode(&encode(SlotStatus::LIVE, &record)).unwrap();
            prop_assert_eq!(decoded, stored_form(&record));
        }
    }
}
