use crate::features::classify::GeoRecord;
use chrono::NaiveDateTime;

/// A geotagged record with its place in the run.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedPlacemark {
    /// 1-based, assigned over the chronological order. Only meaningful within one run.
    pub sequence: usize,
    pub name: String,
    pub record: GeoRecord,
}

/// Placemarks sorted oldest first. Timestamp-less records come last, in input order.
#[derive(Debug, Clone, Default)]
pub struct OrderedPlacemarks {
    chronological: Vec<OrderedPlacemark>,
}

impl OrderedPlacemarks {
    /// Oldest first; the order the fly-through visits them in.
    pub fn chronological(&self) -> &[OrderedPlacemark] {
        &self.chronological
    }

    /// Most recent first; the order placemarks are listed in the document.
    /// Sequence numbers are the same as in [`Self::chronological`].
    pub fn newest_first(&self) -> impl Iterator<Item = &OrderedPlacemark> {
        self.chronological.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.chronological.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chronological.is_empty()
    }
}

pub fn placemark_name(sequence: usize) -> String {
    format!("p{sequence}")
}

/// Sorts geotagged records by `(time is missing, time)` and numbers them `1..=N`.
///
/// The sort is stable: equal timestamps, and records without one, keep their
/// relative input order.
pub fn order(mut records: Vec<GeoRecord>) -> OrderedPlacemarks {
    records.sort_by_key(|r| {
        let time = r.time.map(|t| t.datetime);
        (time.is_none(), time.unwrap_or(NaiveDateTime::UNIX_EPOCH))
    });

    let chronological = records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            let sequence = i + 1;
            OrderedPlacemark {
                sequence,
                name: placemark_name(sequence),
                record,
            }
        })
        .collect();
    OrderedPlacemarks { chronological }
}
