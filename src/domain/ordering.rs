//! Sibling ordering shared by the materializer and the meta sidecars.
//!
//! `order` is advisory: a node without one sorts after every ordered sibling,
//! and ties (including two unordered nodes) break by name.

use std::cmp::Ordering;

pub fn order_key(order: Option<i32>) -> (bool, i32) {
    (order.is_none(), order.unwrap_or_default())
}

pub fn compare_siblings(
    left_order: Option<i32>,
    left_name: &str,
    right_order: Option<i32>,
    right_name: &str,
) -> Ordering {
    order_key(left_order)
        .cmp(&order_key(right_order))
        .then_with(|| left_name.cmp(right_name))
}
