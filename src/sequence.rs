// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Packet sequence tracking for loss and reorder diagnostics.
//!
//! Sequence numbers wrap at 2^32. The expected successor of `last` is
//! `last + 1 (mod 2^32)`, so `u32::MAX` followed by `0` is in order. Events
//! are diagnostic only and never cause a packet to be rejected.

/// Classification of one observed sequence number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceEvent {
    /// No previous sequence to compare against
    First,
    /// Exactly the expected successor
    InOrder,
    /// Ahead of the expected successor by this many packets
    Gap(u32),
    /// Behind the expected successor
    Reorder,
}

/// Tracks the last accepted sequence number.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequenceTracker {
    last: Option<u32>,
}

impl SequenceTracker {
    /// Create a tracker with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last observed sequence, if any.
    pub fn last(&self) -> Option<u32> {
        self.last
    }

    /// Record `seq` and classify it against the previous one.
    pub fn observe(&mut self, seq: u32) -> SequenceEvent {
        let event = match self.last {
            None => SequenceEvent::First,
            Some(last) => {
                let expected = last.wrapping_add(1);
                if seq == expected {
                    SequenceEvent::InOrder
                } else if seq > expected {
                    SequenceEvent::Gap(seq - expected)
                } else {
                    SequenceEvent::Reorder
                }
            }
        };

        self.last = Some(seq);
        event
    }

    /// Forget the last sequence; the next one observed is `First`.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
