use std::sync::Arc;

use relay_reflect::{Object, TypeDescriptor};

use super::*;

fn handler() -> Handle {
	Object::new(TypeDescriptor::from_u32(0))
}

fn same(a: &[Handle], b: &[&Handle]) -> bool {
	a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
}

#[test]
fn latest_append_has_priority() {
	let (a, b, c) = (handler(), handler(), handler());
	let mut chain = HandlerChain::new();
	chain.append(&a);
	chain.append_all([&b, &c]);
	assert!(same(&chain.live(), &[&c, &b, &a]));
}

#[test]
fn insert_uses_priority_indices() {
	let (a, b, c, d) = (handler(), handler(), handler(), handler());
	let mut chain = HandlerChain::new();
	chain.append(&a);
	chain.append(&b);
	chain.insert(0, &c);
	assert!(same(&chain.live(), &[&c, &b, &a]));
	chain.insert(3, &d);
	assert!(same(&chain.live(), &[&c, &b, &a, &d]));
}

#[test]
fn insert_all_keeps_relative_order() {
	let (a, b, c, d) = (handler(), handler(), handler(), handler());
	let mut chain = HandlerChain::new();
	chain.append(&a);
	chain.append(&b);
	chain.insert_all(1, [&c, &d]);
	assert!(same(&chain.live(), &[&b, &c, &d, &a]));
}

#[test]
#[should_panic(expected = "insertion index")]
fn insert_past_end_panics() {
	let mut chain = HandlerChain::new();
	chain.insert(1, &handler());
}

#[test]
fn remove_by_identity() {
	let (a, b, stranger) = (handler(), handler(), handler());
	let mut chain = HandlerChain::new();
	chain.append_all([&a, &b]);

	let removed = chain.remove(&a).expect("a is in the chain");
	assert!(Arc::ptr_eq(&removed, &a));
	assert!(chain.remove(&stranger).is_none());
	assert!(!chain.contains(&a));
	assert!(chain.contains(&b));
	assert_eq!(chain.len(), 1);
}

#[test]
fn remove_at_reports_dead_referents_as_none() {
	let a = handler();
	let mut chain = HandlerChain::new();
	chain.append(&a);
	{
		let doomed = handler();
		chain.append(&doomed);
	}
	assert!(chain.remove_at(0).is_none());
	assert!(chain.remove_at(5).is_none());
	assert!(Arc::ptr_eq(&chain.remove_at(0).unwrap(), &a));
	assert!(chain.is_empty());
}

#[test]
fn find_purges_dead_entries_it_visits() {
	let (a, b) = (handler(), handler());
	let mut chain = HandlerChain::new();
	chain.append(&a);
	chain.append(&b);
	{
		let doomed = handler();
		chain.append(&doomed);
	}
	assert_eq!(chain.len(), 3);

	let found = chain.find(|h| Arc::ptr_eq(h, &b)).unwrap();
	assert!(Arc::ptr_eq(&found, &b));
	assert_eq!(chain.len(), 2);
}

#[test]
fn find_without_match_purges_everything_dead() {
	let a = handler();
	let mut chain = HandlerChain::new();
	{
		let (x, y) = (handler(), handler());
		chain.append(&x);
		chain.append(&a);
		chain.append(&y);
	}
	assert!(chain.find(|_| false).is_none());
	assert_eq!(chain.len(), 1);
	assert!(chain.contains(&a));
}

#[test]
fn purge_sweeps_all_dead_entries() {
	let a = handler();
	let mut chain = HandlerChain::new();
	chain.append(&a);
	for _ in 0..3 {
		chain.append(&handler());
	}
	assert_eq!(chain.purge(), 3);
	assert_eq!(chain.len(), 1);
}
