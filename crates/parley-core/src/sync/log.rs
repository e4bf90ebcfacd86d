//! In-memory message log for the selected chat.
//!
//! The log is the single place the ordering and uniqueness rules live:
//! every source (initial load, confirmed send, realtime push, history page)
//! goes through [`MessageLog::merge`].

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use parley_types::chat::Message;
use uuid::Uuid;

/// Ordered, duplicate-free sequence of messages.
///
/// Entries are sorted by `created_at` ascending. A merged message lands
/// after every entry whose timestamp is `<=` its own, so entries sharing a
/// timestamp keep the order in which they were merged. Entries are never
/// mutated or removed individually.
#[derive(Debug, Default, Clone)]
pub struct MessageLog {
    entries: Vec<Message>,
    ids: HashSet<Uuid>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    /// Timestamp of the oldest loaded message (the pagination cursor).
    pub fn oldest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.entries.first().map(|m| m.created_at)
    }

    /// Insert `message` at its sorted position.
    ///
    /// Returns the index it was placed at, or `None` if a message with the
    /// same id is already present (the log is left untouched).
    pub fn merge(&mut self, message: Message) -> Option<usize> {
        if !self.ids.insert(message.id) {
            return None;
        }
        let index = self
            .entries
            .partition_point(|existing| existing.created_at <= message.created_at);
        self.entries.insert(index, message);
        Some(index)
    }

    /// Merge every message in `messages`, returning how many were new.
    pub fn merge_all(&mut self, messages: impl IntoIterator<Item = Message>) -> usize {
        messages
            .into_iter()
            .filter_map(|message| self.merge(message))
            .count()
    }

    /// Drop every entry. Used only when the whole log is swapped out.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.ids.clear();
    }

    pub fn to_vec(&self) -> Vec<Message> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use parley_types::chat::Sender;

    fn at(chat_id: Uuid, seconds: i64, content: &str) -> Message {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        Message {
            id: Uuid::now_v7(),
            chat_id,
            content: content.to_string(),
            sender: Sender::User,
            created_at: base + Duration::seconds(seconds),
        }
    }

    fn contents(log: &MessageLog) -> Vec<&str> {
        log.iter().map(|m| m.content.as_str()).collect()
    }

    fn assert_sorted_unique(log: &MessageLog) {
        let slice = log.as_slice();
        for pair in slice.windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }
        let ids: HashSet<_> = slice.iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), slice.len());
    }

    #[test]
    fn merge_appends_in_timestamp_order() {
        let chat = Uuid::now_v7();
        let mut log = MessageLog::new();
        assert_eq!(log.merge(at(chat, 1, "a")), Some(0));
        assert_eq!(log.merge(at(chat, 2, "b")), Some(1));
        assert_eq!(log.merge(at(chat, 3, "c")), Some(2));
        assert_eq!(contents(&log), vec!["a", "b", "c"]);
    }

    #[test]
    fn merge_inserts_out_of_order_rows_at_sorted_position() {
        let chat = Uuid::now_v7();
        let mut log = MessageLog::new();
        log.merge(at(chat, 5, "e"));
        log.merge(at(chat, 1, "a"));
        assert_eq!(log.merge(at(chat, 3, "c")), Some(1));
        assert_eq!(contents(&log), vec!["a", "c", "e"]);
    }

    #[test]
    fn merging_same_row_twice_is_a_noop() {
        let chat = Uuid::now_v7();
        let mut log = MessageLog::new();
        let row = at(chat, 1, "a");
        assert!(log.merge(row.clone()).is_some());
        assert_eq!(log.merge(row.clone()), None);
        assert_eq!(log.len(), 1);
        assert!(log.contains(&row.id));
    }

    #[test]
    fn equal_timestamps_keep_arrival_order() {
        let chat = Uuid::now_v7();
        let mut log = MessageLog::new();
        log.merge(at(chat, 2, "first"));
        log.merge(at(chat, 2, "second"));
        // A later merge with the same timestamp lands after both.
        log.merge(at(chat, 2, "third"));
        // An older row slots in front without disturbing the tie group.
        log.merge(at(chat, 1, "older"));
        assert_eq!(contents(&log), vec!["older", "first", "second", "third"]);
    }

    #[test]
    fn final_state_independent_of_merge_order() {
        let chat = Uuid::now_v7();
        let rows: Vec<Message> = (0..6).map(|i| at(chat, i * 10, &format!("m{i}"))).collect();

        let orders: [[usize; 6]; 4] = [
            [0, 1, 2, 3, 4, 5],
            [5, 4, 3, 2, 1, 0],
            [3, 0, 5, 1, 4, 2],
            [2, 2, 5, 0, 3, 1],
        ];

        let mut expected: Option<Vec<Uuid>> = None;
        for order in orders {
            let mut log = MessageLog::new();
            for &i in &order {
                log.merge(rows[i].clone());
            }
            // Every row once more, as a duplicate push would deliver it.
            for row in &rows {
                log.merge(row.clone());
            }
            assert_sorted_unique(&log);
            let ids: Vec<Uuid> = log.iter().map(|m| m.id).collect();
            match &expected {
                None => expected = Some(ids),
                Some(first) => assert_eq!(first, &ids),
            }
        }
        assert_eq!(expected.unwrap().len(), 6);
    }

    #[test]
    fn history_page_then_older_push_stays_sorted() {
        let chat = Uuid::now_v7();
        let mut log = MessageLog::new();
        log.merge_all((20..25).map(|i| at(chat, i, "recent")));
        let added = log.merge_all((10..20).map(|i| at(chat, i, "page")));
        assert_eq!(added, 10);
        log.merge(at(chat, 3, "late push"));
        assert_eq!(log.len(), 16);
        assert_eq!(log.as_slice()[0].content, "late push");
        assert_sorted_unique(&log);
    }

    #[test]
    fn merge_all_counts_only_new_rows() {
        let chat = Uuid::now_v7();
        let mut log = MessageLog::new();
        let rows: Vec<Message> = (0..3).map(|i| at(chat, i, "x")).collect();
        assert_eq!(log.merge_all(rows.clone()), 3);
        assert_eq!(log.merge_all(rows), 0);
    }

    #[test]
    fn oldest_timestamp_tracks_head() {
        let chat = Uuid::now_v7();
        let mut log = MessageLog::new();
        assert_eq!(log.oldest_timestamp(), None);
        let newer = at(chat, 10, "b");
        let older = at(chat, 5, "a");
        log.merge(newer);
        log.merge(older.clone());
        assert_eq!(log.oldest_timestamp(), Some(older.created_at));
    }

    #[test]
    fn clear_resets_dedup_set() {
        let chat = Uuid::now_v7();
        let mut log = MessageLog::new();
        let row = at(chat, 1, "a");
        log.merge(row.clone());
        log.clear();
        assert!(log.is_empty());
        assert!(log.merge(row).is_some());
    }
}
