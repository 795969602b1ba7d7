use crate::error::GrexError;

/// An entry's position in the logical offset space its directory declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclaredSpan {
    pub offset: u64,
    pub length: u64,
}

/// Where an entry's bytes actually live in a multi-volume set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicalLocation {
    /// The index of the volume.
    pub volume: usize,
    /// The offset within that volume.
    pub offset: u64,
}

fn padded(length: u64, alignment: u64) -> Option<u64> {
    if alignment <= 1 {
        return Some(length);
    }
    length
        .checked_add(alignment - 1)
        .map(|end| end / alignment * alignment)
}

/// Maps the declared spans of a split directory onto physical volumes.
///
/// Spans are visited in ascending declared offset, ties in input order. Each span is
/// placed at a running cursor that then advances by the span's length rounded up to
/// `alignment`. A span whose declared offset repeats the previous one shares that
/// location and leaves the cursor alone. When a span does not fit in the rest of the
/// current volume the cursor moves to the start of the next volume, once; a span that
/// still does not fit is a `ConstraintViolation`.
///
/// The result is indexed like `spans`.
pub fn rebase_offsets(
    spans: &[DeclaredSpan],
    volume_sizes: &[u64],
    alignment: u64,
) -> Result<Vec<PhysicalLocation>, GrexError> {
    let mut order: Vec<usize> = (0..spans.len()).collect();
    order.sort_by_key(|&i| spans[i].offset);

    let mut locations = vec![
        PhysicalLocation {
            volume: 0,
            offset: 0
        };
        spans.len()
    ];
    let mut volume = 0usize;
    let mut cursor = 0u64;
    let mut previous: Option<(u64, PhysicalLocation)> = None;

    for index in order {
        let span = spans[index];
        if let Some((offset, location)) = previous {
            if offset == span.offset {
                locations[index] = location;
                continue;
            }
        }

        let fits = |volume: usize, cursor: u64| {
            volume_sizes
                .get(volume)
                .is_some_and(|&size| cursor.checked_add(span.length).is_some_and(|end| end <= size))
        };
        if !fits(volume, cursor) {
            volume += 1;
            cursor = 0;
            if !fits(volume, cursor) {
                return Err(GrexError::constraint(format!(
                    "entry at {} ({} bytes) fits no volume",
                    span.offset, span.length
                )));
            }
        }

        let location = PhysicalLocation {
            volume,
            offset: cursor,
        };
        let advance = padded(span.length, alignment).ok_or_else(|| {
            GrexError::constraint(format!("entry length {} overflows", span.length))
        })?;
        cursor = cursor.saturating_add(advance);
        locations[index] = location;
        previous = Some((span.offset, location));
    }

    Ok(locations)
}
