use std::{cell::RefCell, rc::Rc};

use super::*;

#[test]
fn listeners_run_in_subscription_order() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut bus = EventBus::new();
    let a = Rc::clone(&seen);
    bus.subscribe(move |e| a.borrow_mut().push(("a", e.clone())));
    let b = Rc::clone(&seen);
    bus.subscribe(move |e| b.borrow_mut().push(("b", e.clone())));

    let moved = SessionEvent::EntityMoved { id: EntityId(3) };
    bus.emit(&moved);
    assert_eq!(
        *seen.borrow(),
        vec![("a", moved.clone()), ("b", moved)]
    );
    assert_eq!(bus.emitted(), 1);
}

#[test]
fn unsubscribed_listeners_stop_receiving() {
    let count = Rc::new(RefCell::new(0));
    let mut bus = EventBus::new();
    let c = Rc::clone(&count);
    let id = bus.subscribe(move |_| *c.borrow_mut() += 1);

    bus.emit(&SessionEvent::EntityMoveFinished { id: EntityId(1) });
    assert!(bus.unsubscribe(id));
    assert!(!bus.unsubscribe(id));
    bus.emit(&SessionEvent::EntityMoveFinished { id: EntityId(1) });

    assert_eq!(*count.borrow(), 1);
    assert_eq!(bus.listener_count(), 0);
}

#[test]
fn events_serialize_with_a_tag() {
    let json = serde_json::to_value(SessionEvent::ToolSelected {
        module: ModuleId(2),
        tool_index: 1,
    })
    .unwrap();
    assert_eq!(json["event"], "tool_selected");
    assert_eq!(json["tool_index"], 1);
}
