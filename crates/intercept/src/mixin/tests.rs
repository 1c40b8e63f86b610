use std::sync::Barrier;
use std::thread;

use pretty_assertions::assert_eq;
use relay_reflect::Object;
use relay_run_loop::RunLoop;

use super::*;
use crate::testing::{Fixture, cap, labelled, msg, reply};

fn same(a: Option<Handle>, b: &Handle) -> bool {
	a.is_some_and(|a| Arc::ptr_eq(&a, b))
}

#[test]
fn chain_is_consulted_before_the_owner() {
	let fx = Fixture::new();
	let widget = fx.handler_type("Widget", &["didScroll"]);
	let scroller = fx.handler_type("Scroller", &["didScroll"]);
	let owner = Object::new(widget);
	let dispatch = fx.ctx.attach_dispatch(&owner);
	dispatch.add_capability(&cap("Scrolling")).unwrap();

	assert!(same(dispatch.resolve(&msg("didScroll")), &owner));

	let handler = fx.handler(scroller);
	dispatch.append_handler(&handler);
	dispatch.flush_pending();
	assert!(same(dispatch.resolve(&msg("didScroll")), &handler));

	dispatch.remove_handler(&handler);
	dispatch.flush_pending();
	assert!(same(dispatch.resolve(&msg("didScroll")), &owner));
	assert!(dispatch.resolve(&msg("didZoom")).is_none());
}

#[test]
fn capabilities_widen_the_owner_type() {
	let fx = Fixture::new();
	let widget = fx.handler_type("Widget", &[]);
	let owner = Object::new(widget);
	let dispatch = fx.ctx.attach_dispatch(&owner);

	assert!(dispatch.add_capability(&cap("Scrolling")).unwrap());
	let first = owner.type_descriptor();
	assert_eq!(fx.table.type_name(first).as_deref(), Some("Widget_Scrolling"));
	assert_eq!(fx.table.parent(first), Some(widget));

	assert!(!dispatch.add_capability(&cap("Scrolling")).unwrap());
	assert_eq!(owner.type_descriptor(), first);

	assert_eq!(dispatch.add_capabilities([&cap("Selection"), &cap("Scrolling")]).unwrap(), 1);
	let second = owner.type_descriptor();
	assert_eq!(
		fx.table.type_name(second).as_deref(),
		Some("Widget_Scrolling,Selection")
	);
	assert_eq!(dispatch.base_type(), widget);
	assert_eq!(
		dispatch.capabilities().as_slice(),
		&[cap("Scrolling"), cap("Selection")]
	);

	let sibling = Object::new(widget);
	let sibling_dispatch = fx.ctx.attach_dispatch(&sibling);
	sibling_dispatch
		.add_capabilities([&cap("Selection"), &cap("Scrolling")])
		.unwrap();
	assert_eq!(sibling.type_descriptor(), second);
}

#[test]
fn conforming_owner_keeps_its_type() {
	let fx = Fixture::new();
	let widget = fx.handler_type("Widget", &[]);
	fx.table.add_capability(widget, &cap("Table")).unwrap();
	let owner = Object::new(widget);
	let dispatch = fx.ctx.attach_dispatch(&owner);

	assert!(dispatch.add_capability(&cap("Scrolling")).unwrap());
	assert_eq!(owner.type_descriptor(), widget);
}

#[test]
fn mutations_coalesce_into_one_flush_per_turn() {
	let fx = Fixture::new();
	let widget = fx.handler_type("Widget", &[]);
	let scroller = fx.handler_type("Scroller", &["didScroll"]);
	let owner = Object::new(widget);
	let dispatch = fx.ctx.attach_dispatch(&owner);
	dispatch.add_capability(&cap("Scrolling")).unwrap();

	assert!(dispatch.resolve(&msg("didScroll")).is_none());
	assert_eq!(dispatch.cache().len(), 1);

	let handlers: Vec<Handle> = (0..32).map(|_| fx.handler(scroller)).collect();
	for handler in &handlers {
		dispatch.append_handler(handler);
	}
	assert!(dispatch.cache().is_dirty());
	assert_eq!(dispatch.cache().flush_count(), 0);
	assert_eq!(RunLoop::current().pending(), 1);

	let report = RunLoop::current().run_turn();
	assert_eq!(report.executed(), 1);
	assert_eq!(dispatch.cache().flush_count(), 1);
	assert!(same(dispatch.resolve(&msg("didScroll")), &handlers[31]));

	assert_eq!(RunLoop::current().run_turn().executed(), 0);
	assert_eq!(dispatch.cache().flush_count(), 1);
}

#[test]
fn reading_a_dirty_cache_flushes_it_once() {
	let fx = Fixture::new();
	let widget = fx.handler_type("Widget", &[]);
	let scroller = fx.handler_type("Scroller", &["didScroll"]);
	let owner = Object::new(widget);
	let dispatch = fx.ctx.attach_dispatch(&owner);
	dispatch.add_capability(&cap("Scrolling")).unwrap();
	assert!(dispatch.resolve(&msg("didScroll")).is_none());

	let handlers: Vec<Handle> = (0..8).map(|_| fx.handler(scroller)).collect();
	dispatch.append_handlers(&handlers);
	assert!(same(dispatch.resolve(&msg("didScroll")), &handlers[7]));
	assert_eq!(dispatch.cache().flush_count(), 1);

	// The queued flush finds nothing left to do.
	assert_eq!(RunLoop::current().run_turn().executed(), 1);
	assert_eq!(dispatch.cache().flush_count(), 1);
}

#[test]
fn mutation_on_a_thread_that_never_turns_its_loop() {
	let fx = Fixture::new();
	let widget = fx.handler_type("Widget", &[]);
	let scroller = fx.handler_type("Scroller", &["didScroll"]);
	let owner = Object::new(widget);
	let dispatch = fx.ctx.attach_dispatch(&owner);
	dispatch.add_capability(&cap("Scrolling")).unwrap();
	assert!(dispatch.resolve(&msg("didScroll")).is_none());

	let early = fx.handler(scroller);
	thread::scope(|s| {
		s.spawn(|| dispatch.append_handler(&early));
	});
	assert_eq!(RunLoop::current().pending(), 0);
	assert!(dispatch.cache().is_dirty());

	assert!(same(dispatch.resolve(&msg("didScroll")), &early));
	assert!(!dispatch.cache().is_dirty());

	let late = fx.handler(scroller);
	dispatch.append_handler(&late);
	assert!(same(dispatch.resolve(&msg("didScroll")), &late));
	assert_eq!(dispatch.cache().flush_count(), 2);
}

#[test]
fn removed_handler_is_never_dispatched_to() {
	let fx = Fixture::new();
	let widget = fx.handler_type("Widget", &[]);
	let scroller = fx.handler_type("Scroller", &["didScroll"]);
	let owner = Object::new(widget);
	let dispatch = fx.ctx.attach_dispatch(&owner);
	dispatch.add_capability(&cap("Scrolling")).unwrap();

	let handler = fx.handler(scroller);
	dispatch.append_handler(&handler);
	assert!(same(dispatch.resolve(&msg("didScroll")), &handler));

	assert!(same(dispatch.remove_handler(&handler), &handler));
	assert!(!dispatch.contains_handler(&handler));
	assert!(dispatch.resolve(&msg("didScroll")).is_none());
	assert!(!dispatch.responds_to(&msg("didScroll")));
	assert!(matches!(
		dispatch.send(&msg("didScroll"), &[]),
		Err(SendError::Unrecognized { .. })
	));
}

#[test]
fn concurrent_mutation_and_resolution() {
	const WRITERS: usize = 4;
	const READERS: usize = 4;
	const ROUNDS: usize = 64;

	let fx = Fixture::new();
	let widget = fx.handler_type("Widget", &[]);
	let scroller = fx.handler_type("Scroller", &["didScroll"]);
	let owner = Object::new(widget);
	let dispatch = fx.ctx.attach_dispatch(&owner);
	dispatch.add_capability(&cap("Scrolling")).unwrap();
	let anchor = fx.handler(scroller);
	dispatch.append_handler(&anchor);
	let barrier = Barrier::new(WRITERS + READERS);

	thread::scope(|s| {
		for _ in 0..WRITERS {
			s.spawn(|| {
				barrier.wait();
				for round in 0..ROUNDS {
					let transient = fx.handler(scroller);
					dispatch.append_handler(&transient);
					if round % 2 == 0 {
						dispatch.remove_handler(&transient);
					}
				}
			});
		}
		for _ in 0..READERS {
			s.spawn(|| {
				barrier.wait();
				for _ in 0..ROUNDS {
					let resolved = dispatch.resolve(&msg("didScroll"));
					assert!(resolved.is_some_and(|h| h.type_descriptor() == scroller));
					assert!(dispatch.responds_to(&msg("didScroll")));
				}
			});
		}
	});

	assert!(same(dispatch.resolve(&msg("didScroll")), &anchor));
	assert_eq!(dispatch.handlers().len(), 1);
}

#[test]
fn cached_miss_still_rechecks_owner_type() {
	let fx = Fixture::new();
	let widget = fx.handler_type("Widget", &[]);
	let owner = Object::new(widget);
	let dispatch = fx.ctx.attach_dispatch(&owner);
	dispatch.add_capability(&cap("Scrolling")).unwrap();

	assert!(dispatch.resolve(&msg("didZoom")).is_none());
	fx.table
		.add_implementation(widget, &msg("didZoom"), labelled("Widget", "didZoom"))
		.unwrap();
	assert!(same(dispatch.resolve(&msg("didZoom")), &owner));
	assert_eq!(dispatch.cache().flush_count(), 0);
}

#[test]
fn dead_cached_handler_falls_back_to_a_fresh_walk() {
	let fx = Fixture::new();
	let widget = fx.handler_type("Widget", &[]);
	let scroller = fx.handler_type("Scroller", &["didScroll"]);
	let owner = Object::new(widget);
	let dispatch = fx.ctx.attach_dispatch(&owner);
	dispatch.add_capability(&cap("Scrolling")).unwrap();

	let survivor = fx.handler(scroller);
	dispatch.append_handler(&survivor);
	{
		let doomed = fx.handler(scroller);
		dispatch.append_handler(&doomed);
		dispatch.flush_pending();
		assert!(same(dispatch.resolve(&msg("didScroll")), &doomed));
	}
	assert!(same(dispatch.resolve(&msg("didScroll")), &survivor));
	assert_eq!(dispatch.handlers().len(), 1);
}

#[test]
fn foreign_messages_fall_through_to_the_owner() {
	let fx = Fixture::new();
	let widget = fx.handler_type("Widget", &["layout"]);
	let owner = Object::new(widget);
	let dispatch = fx.ctx.attach_dispatch(&owner);
	dispatch.add_capability(&cap("Scrolling")).unwrap();

	assert!(dispatch.resolve(&msg("layout")).is_none());
	assert!(dispatch.responds_to(&msg("layout")));
	assert!(!dispatch.responds_to(&msg("didScroll")));

	let value = dispatch.send(&msg("layout"), &[]).unwrap();
	assert_eq!(value.as_str(), Some("Widget.layout"));
	assert!(matches!(
		dispatch.send(&msg("didScroll"), &[]),
		Err(SendError::Unrecognized { .. })
	));
}

#[test]
fn send_forwards_to_chained_handler() {
	let fx = Fixture::new();
	let widget = fx.handler_type("Widget", &["didScroll"]);
	let scroller = fx.handler_type("Scroller", &["didScroll"]);
	let owner = Object::new(widget);
	let dispatch = fx.ctx.attach_dispatch(&owner);
	dispatch.add_capability(&cap("Scrolling")).unwrap();
	let handler = fx.handler(scroller);
	dispatch.insert_handler(0, &handler);

	let value = dispatch.send(&msg("didScroll"), &[]).unwrap();
	assert_eq!(value.as_str(), Some("Scroller.didScroll"));
}

#[test]
fn widening_keeps_a_graft_applied_after_attach() {
	let fx = Fixture::new();
	let widget = fx.handler_type("Widget", &["didScroll"]);
	let smooth = fx.handler_type("Smooth", &["didScroll"]);
	fx.table.add_capability(smooth, &cap("Scrolling")).unwrap();
	let owner = Object::new(widget);
	let dispatch = fx.ctx.attach_dispatch(&owner);
	dispatch.add_capability(&cap("Scrolling")).unwrap();

	let grafted = fx.ctx.graft(&cap("Scrolling"), smooth, &owner).unwrap();
	assert_eq!(reply(&fx.table, &owner, "didScroll"), "Smooth.didScroll");

	assert!(dispatch.add_capability(&cap("Selection")).unwrap());
	let widened = owner.type_descriptor();
	assert_eq!(fx.table.parent(widened), Some(grafted));
	assert!(fx.table.conforms_to(widened, &cap("Selection")));
	assert_eq!(reply(&fx.table, &owner, "didScroll"), "Smooth.didScroll");

	let sibling = Object::new(widget);
	fx.ctx
		.attach_dispatch(&sibling)
		.add_capabilities([&cap("Scrolling"), &cap("Selection")])
		.unwrap();
	assert_eq!(fx.table.parent(sibling.type_descriptor()), Some(widget));
}

#[test]
fn side_table_tracks_owner_lifetimes() {
	let fx = Fixture::new();
	let widget = fx.handler_type("Widget", &[]);
	let keeper = Object::new(widget);
	let first = fx.ctx.attach_dispatch(&keeper);
	let again = fx.ctx.attach_dispatch(&keeper);
	assert!(Arc::ptr_eq(&first, &again));
	assert!(fx.ctx.dispatch_for(&keeper).is_some());

	{
		let transient = Object::new(widget);
		fx.ctx.attach_dispatch(&transient);
		assert_eq!(fx.ctx.mixins().len(), 2);
	}
	assert_eq!(fx.ctx.mixins().prune(), 1);
	assert_eq!(fx.ctx.mixins().len(), 1);

	assert!(fx.ctx.detach_dispatch(&keeper).is_some());
	assert!(fx.ctx.dispatch_for(&keeper).is_none());
	assert!(first.owner().is_some());
}
