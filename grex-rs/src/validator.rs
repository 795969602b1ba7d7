//! Bounds-checking primitives for structural fields read from untrusted containers.
//!
//! Every descriptor is probed against every candidate file, so a header field is
//! only trusted after it has been checked here. Each check either returns the
//! validated value or a [`GrexError::ConstraintViolation`], which ends the current
//! parse attempt without allocating or reading anything further.

use crate::error::GrexError;
use std::path::{Component, Path};

/// The longest logical name a directory entry may carry.
pub const MAX_NAME_LENGTH: usize = 1024;

/// An integer field read from a container, of any width or signedness.
pub trait FieldValue: Copy + std::fmt::Display {
    fn to_wide(self) -> i128;
}

macro_rules! impl_field_value {
    ($($ty:ty),*) => {
        $(impl FieldValue for $ty {
            #[inline]
            fn to_wide(self) -> i128 {
                self as i128
            }
        })*
    };
}

impl_field_value!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

/// Stateless validation checks used by format descriptors.
pub struct Validator;

impl Validator {
    /// Accepts `0 <= count <= max`.
    pub fn check_count<T: FieldValue>(count: T, max: u64) -> Result<u64, GrexError> {
        let wide = count.to_wide();
        if wide < 0 || wide > max as i128 {
            return Err(GrexError::constraint(format!(
                "count {count} is outside 0..={max}"
            )));
        }
        Ok(wide as u64)
    }

    /// Accepts a count only if `count` entries of `entry_size` bytes fit in `available` bytes.
    ///
    /// This rejects counts that would force an allocation larger than the input itself.
    pub fn check_count_for<T: FieldValue>(
        count: T,
        entry_size: u64,
        available: u64,
    ) -> Result<u64, GrexError> {
        let max = available / entry_size.max(1);
        Self::check_count(count, max).map_err(|_| {
            GrexError::constraint(format!(
                "{count} entries of {entry_size} bytes do not fit in {available} bytes"
            ))
        })
    }

    /// Accepts `0 <= offset < size`.
    pub fn check_offset<T: FieldValue>(offset: T, size: u64) -> Result<u64, GrexError> {
        let wide = offset.to_wide();
        if wide < 0 || wide >= size as i128 {
            return Err(GrexError::constraint(format!(
                "offset {offset} is outside a container of {size} bytes"
            )));
        }
        Ok(wide as u64)
    }

    /// Accepts `0 <= length <= bound`.
    pub fn check_length<T: FieldValue>(length: T, bound: u64) -> Result<u64, GrexError> {
        let wide = length.to_wide();
        if wide < 0 || wide > bound as i128 {
            return Err(GrexError::constraint(format!(
                "length {length} is outside 0..={bound}"
            )));
        }
        Ok(wide as u64)
    }

    /// Returns `offset + length`, or a `ConstraintViolation` when the sum overflows.
    pub fn check_end(offset: u64, length: u64) -> Result<u64, GrexError> {
        offset.checked_add(length).ok_or_else(|| {
            GrexError::constraint(format!("{offset}+{length} overflows a 64-bit offset"))
        })
    }

    /// Accepts a span if `offset + length` does not overflow and ends within `size`.
    pub fn check_span<O: FieldValue, L: FieldValue>(
        offset: O,
        length: L,
        size: u64,
    ) -> Result<(u64, u64), GrexError> {
        let start = offset.to_wide();
        let len = length.to_wide();
        if start < 0 || len < 0 || start + len > size as i128 {
            return Err(GrexError::constraint(format!(
                "span {offset}+{length} exceeds a container of {size} bytes"
            )));
        }
        Ok((start as u64, len as u64))
    }

    /// Accepts a non-empty name with no control characters and at most [`MAX_NAME_LENGTH`] bytes.
    pub fn check_name(name: &str) -> Result<&str, GrexError> {
        if name.is_empty() {
            return Err(GrexError::constraint("empty name"));
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(GrexError::constraint(format!(
                "name of {} bytes exceeds {MAX_NAME_LENGTH}",
                name.len()
            )));
        }
        if let Some(c) = name.chars().find(|c| c.is_control()) {
            return Err(GrexError::constraint(format!(
                "name contains control character {:#04x}",
                c as u32
            )));
        }
        Ok(name)
    }

    /// Validates a fixed-size, NUL padded name field and returns it as a `String`.
    ///
    /// Bytes after the first NUL are ignored.
    pub fn check_name_bytes(bytes: &[u8]) -> Result<String, GrexError> {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let name = std::str::from_utf8(&bytes[..end])
            .map_err(|_| GrexError::constraint("name is not valid UTF-8"))?;
        Self::check_name(name).map(str::to_string)
    }

    /// Accepts a name that stays inside the directory it is extracted to.
    ///
    /// Both `/` and `\` are treated as separators.
    pub fn check_relative_path(name: &str) -> Result<&str, GrexError> {
        Self::check_name(name)?;
        let normalized = name.replace('\\', "/");
        if normalized.starts_with('/') {
            return Err(GrexError::constraint(format!("{name} is an absolute path")));
        }
        for component in Path::new(&normalized).components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(GrexError::constraint(format!(
                        "{name} escapes the output directory"
                    )))
                }
            }
        }
        Ok(name)
    }
}
