//! Display order for a session's messages.
//!
//! Most liked first; equal likes keep ascending `created_at`. The sort is
//! stable, so callers that feed messages in insertion order also get a
//! deterministic order for identical timestamps.

use std::cmp::Ordering;

use crate::MessageInfo;

pub fn compare(a: &MessageInfo, b: &MessageInfo) -> Ordering {
    b.likes
        .cmp(&a.likes)
        .then_with(|| a.created_at.cmp(&b.created_at))
}

pub fn rank(messages: &mut [MessageInfo]) {
    messages.sort_by(compare);
}
