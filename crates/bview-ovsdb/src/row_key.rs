//! Row-key codec for the `bufmon` table.
//!
//! A row is named `<realm>/<counter>/<index1>/<index2>`. Double-indexed
//! BIDs carry the port in `index1` and the pool or group in `index2`;
//! single-indexed BIDs carry the queue or pool in `index1`; unused slots
//! hold `NONE`. Decoding also accepts the short three-token form that
//! omits `index2`.

use crate::bid::{resolve_logical_index, Bid};
use bview_types::{BviewError, Result};

/// Placeholder for an unused index slot.
pub const NONE_TOKEN: &str = "NONE";

/// Counter position recovered from a row key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowKey {
    pub bid: Bid,
    /// 1-based port for double-indexed BIDs, 0 otherwise.
    pub port: u32,
    pub index: u32,
}

impl RowKey {
    pub fn new(bid: Bid, port: u32, index: u32) -> Self {
        Self { bid, port, index }
    }

    /// Renders the database row name.
    pub fn encode(&self) -> String {
        encode(self.bid, self.port, self.index)
    }
}

/// Renders the row name of a counter.
pub fn encode(bid: Bid, port: u32, index: u32) -> String {
    let d = bid.descriptor();
    if d.double_indexed {
        format!("{}/{}/{}/{}", d.realm, d.counter, port, index)
    } else if d.indexed {
        format!("{}/{}/{}/{}", d.realm, d.counter, index, NONE_TOKEN)
    } else {
        format!("{}/{}/{}/{}", d.realm, d.counter, NONE_TOKEN, NONE_TOKEN)
    }
}

fn parse_index(key: &str, token: Option<&str>) -> Result<u32> {
    let token = token.ok_or_else(|| {
        BviewError::invalid_parameter(format!("row key {} is missing an index", key))
    })?;
    token.parse().map_err(|_| {
        BviewError::invalid_parameter(format!("row key {} has bad index {:?}", key, token))
    })
}

/// Parses a row name back to its counter position.
pub fn decode(key: &str) -> Result<RowKey> {
    let tokens: Vec<&str> = key.split('/').collect();
    if !(3..=4).contains(&tokens.len()) {
        return Err(BviewError::invalid_parameter(format!(
            "row key {} has {} tokens",
            key,
            tokens.len()
        )));
    }

    let bid = Bid::lookup(tokens[0], tokens[1])
        .ok_or_else(|| BviewError::not_found(format!("BID for row key {}", key)))?;
    let d = bid.descriptor();

    let (port, index) = if d.double_indexed {
        (
            parse_index(key, tokens.get(2).copied())?,
            parse_index(key, tokens.get(3).copied())?,
        )
    } else if d.indexed {
        (0, parse_index(key, tokens.get(2).copied())?)
    } else {
        (0, 0)
    };

    resolve_logical_index(bid, port, index)
        .map_err(|_| BviewError::not_found(format!("counter for row key {}", key)))?;

    Ok(RowKey { bid, port, index })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_shapes() {
        assert_eq!(
            encode(Bid::PriGroupShared, 3, 2),
            "ingress-port-priority-group/um-share-buffer-count/3/2"
        );
        assert_eq!(
            encode(Bid::Ucast, 3, 5),
            "egress-uc-queue/uc-buffer-count/5/NONE"
        );
        assert_eq!(encode(Bid::Device, 0, 0), "device/data/NONE/NONE");
    }

    #[test]
    fn test_decode_short_form() {
        let key = decode("egress-uc-queue/uc-buffer-count/5").unwrap();
        assert_eq!(key, RowKey::new(Bid::Ucast, 0, 5));
    }

    #[test]
    fn test_decode_double_indexed() {
        let key = decode("ingress-port-priority-group/um-share-buffer-count/3/2").unwrap();
        assert_eq!(key, RowKey::new(Bid::PriGroupShared, 3, 2));
        // index2 is mandatory when the port is the first index
        assert!(matches!(
            decode("ingress-port-priority-group/um-share-buffer-count/3"),
            Err(BviewError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_round_trip_every_bid_corner() {
        for bid in Bid::ALL {
            let d = bid.descriptor();
            let mut positions = vec![];
            if d.double_indexed {
                positions.push((1, 0));
                positions.push((d.rows as u32, d.columns as u32 - 1));
            } else if d.indexed {
                positions.push((0, 0));
                positions.push((0, d.size() as u32 - 1));
            } else {
                positions.push((0, 0));
            }
            for (port, index) in positions {
                let key = RowKey::new(bid, port, index);
                assert_eq!(decode(&key.encode()).unwrap(), key);
            }
        }
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            decode("device/data"),
            Err(BviewError::InvalidParameter { .. })
        ));
        assert!(matches!(
            decode("device/data/NONE/NONE/NONE"),
            Err(BviewError::InvalidParameter { .. })
        ));
        assert!(matches!(
            decode("egress-uc-queue/bogus-count/1/NONE"),
            Err(BviewError::NotFound { .. })
        ));
        assert!(matches!(
            decode("egress-cpu-queue/cpu-buffer-count/8/NONE"),
            Err(BviewError::NotFound { .. })
        ));
        assert!(matches!(
            decode("egress-cpu-queue/cpu-buffer-count/x/NONE"),
            Err(BviewError::InvalidParameter { .. })
        ));
    }
}
