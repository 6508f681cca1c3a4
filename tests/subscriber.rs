use spark_tracked::subscriber::{EventHandler, ListenerId};
use spark_tracked::{
    cloned, create_subscriber, effect, flush_sync, on, root, set_media_matcher, tick, CleanupFn,
    Derived, EventTarget, ListenerOptions, MediaMatcher, MediaQuery, MediaQueryList, ReactiveValue, Tracked,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A stand-in for a platform object that fires `"resize"`.
#[derive(Default)]
struct Window {
    width: Cell<u32>,
    next: Cell<u64>,
    listeners: RefCell<Vec<(String, ListenerId, EventHandler)>>,
}

impl Window {
    fn resize(&self, width: u32) {
        self.width.set(width);
        let handlers: Vec<EventHandler> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(t, _, _)| t == "resize")
            .map(|(_, _, h)| h.clone())
            .collect();
        for handler in handlers {
            handler("resize");
        }
    }

    fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl EventTarget for Window {
    fn add_event_listener(&self, event_type: &str, handler: EventHandler, _: ListenerOptions) -> ListenerId {
        let id = ListenerId(self.next.get());
        self.next.set(id.0 + 1);
        self.listeners.borrow_mut().push((event_type.to_string(), id, handler));
        id
    }

    fn remove_event_listener(&self, _: &str, id: ListenerId, _: ListenerOptions) {
        self.listeners.borrow_mut().retain(|(_, l, _)| *l != id);
    }
}

/// Window width as a reactive value: the listener is attached only while an
/// effect reads it.
fn inner_width(window: &Rc<Window>) -> ReactiveValue<u32> {
    let width = Tracked::new(window.width.get());
    let reader = width.clone();
    let target = window.clone();
    ReactiveValue::new(
        move || reader.get(),
        move || {
            let (w, window) = (width.clone(), target.clone());
            Some(on(
                target.clone(),
                "RESIZE",
                move |_| {
                    w.set(window.width.get());
                },
                ListenerOptions::default(),
            ))
        },
    )
}

#[test]
fn listener_attached_only_while_observed() {
    let window = Rc::new(Window::default());
    window.width.set(800);
    let width = inner_width(&window);

    assert_eq!(width.get(), 800);
    assert_eq!(window.listener_count(), 0);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let tree = root(cloned!(width, seen => move || {
        effect(cloned!(width, seen => move || seen.borrow_mut().push(width.get())));
    }));
    flush_sync();
    assert_eq!(window.listener_count(), 1);

    window.resize(1024);
    flush_sync();
    assert_eq!(*seen.borrow(), vec![800, 1024]);

    tree.dispose();
    tick();
    assert_eq!(window.listener_count(), 0);
}

#[test]
fn disposing_one_of_two_consumers_keeps_source_running() {
    let starts = Rc::new(Cell::new(0));
    let stops = Rc::new(Cell::new(0));
    let subscriber = create_subscriber(cloned!(starts, stops => move || {
        starts.set(starts.get() + 1);
        let stops = stops.clone();
        Some(Box::new(move || stops.set(stops.get() + 1)) as CleanupFn)
    }));

    let first = root(cloned!(subscriber => move || {
        effect(cloned!(subscriber => move || subscriber.subscribe()));
    }));
    let second = root(cloned!(subscriber => move || {
        effect(cloned!(subscriber => move || subscriber.subscribe()));
    }));
    flush_sync();
    assert_eq!(subscriber.subscriber_count(), 2);

    first.dispose();
    tick();
    assert_eq!((starts.get(), stops.get()), (1, 0));

    second.dispose();
    tick();
    assert_eq!((starts.get(), stops.get()), (1, 1));
}

#[test]
fn resubscribe_before_tick_cancels_the_release() {
    let starts = Rc::new(Cell::new(0));
    let stops = Rc::new(Cell::new(0));
    let subscriber = create_subscriber(cloned!(starts, stops => move || {
        starts.set(starts.get() + 1);
        let stops = stops.clone();
        Some(Box::new(move || stops.set(stops.get() + 1)) as CleanupFn)
    }));

    let first = root(cloned!(subscriber => move || {
        effect(cloned!(subscriber => move || subscriber.subscribe()));
    }));
    flush_sync();

    first.dispose();
    let _second = root(cloned!(subscriber => move || {
        effect(cloned!(subscriber => move || subscriber.subscribe()));
    }));
    flush_sync();
    tick();

    assert_eq!((starts.get(), stops.get()), (1, 0));
    assert_eq!(subscriber.subscriber_count(), 1);
}

struct StaticList {
    media: String,
    matches: bool,
}

impl EventTarget for StaticList {
    fn add_event_listener(&self, _: &str, _: EventHandler, _: ListenerOptions) -> ListenerId {
        ListenerId(0)
    }

    fn remove_event_listener(&self, _: &str, _: ListenerId, _: ListenerOptions) {}
}

impl MediaQueryList for StaticList {
    fn matches(&self) -> bool {
        self.matches
    }

    fn media(&self) -> String {
        self.media.clone()
    }
}

struct PrintOnly;

impl MediaMatcher for PrintOnly {
    fn match_media(&self, query: &str) -> Rc<dyn MediaQueryList> {
        Rc::new(StaticList {
            media: query.to_string(),
            matches: query == "print",
        })
    }
}

#[test]
fn media_queries_ask_the_installed_matcher() {
    let previous = set_media_matcher(Some(Rc::new(PrintOnly)));

    let print = MediaQuery::new("print", false);
    let wide = MediaQuery::new("min-width: 100px", true);
    assert!(print.current());
    assert!(!wide.current(), "matcher answer wins over the fallback");
    assert_eq!(wide.query(), "(min-width: 100px)");

    set_media_matcher(previous);
}

#[test]
fn reactive_value_read_through_a_derived_keeps_one_subscription() {
    let starts = Rc::new(Cell::new(0));
    let stops = Rc::new(Cell::new(0));
    let source = Tracked::new(1);
    let value = ReactiveValue::new(
        cloned!(source => move || source.get()),
        cloned!(starts, stops => move || {
            starts.set(starts.get() + 1);
            let stops = stops.clone();
            Some(Box::new(move || stops.set(stops.get() + 1)) as CleanupFn)
        }),
    );
    let doubled = Derived::new(cloned!(value => move || value.get() * 2));

    let seen = Rc::new(RefCell::new(Vec::new()));
    let tree = root(cloned!(doubled, seen => move || {
        effect(cloned!(doubled, seen => move || seen.borrow_mut().push(doubled.get())));
    }));
    flush_sync();

    for n in 2..=4 {
        source.set(n);
        flush_sync();
        tick();
    }
    assert_eq!(*seen.borrow(), vec![2, 4, 6, 8]);
    assert_eq!(value.subscriber_count(), 1);
    assert_eq!((starts.get(), stops.get()), (1, 0));

    tree.dispose();
    tick();
    assert_eq!(value.subscriber_count(), 0);
    assert_eq!((starts.get(), stops.get()), (1, 1));
}

/// Platform state shared by every list the matcher hands out.
#[derive(Default)]
struct Screen {
    dark: Cell<bool>,
    next: Cell<u64>,
    listeners: RefCell<Vec<(ListenerId, EventHandler)>>,
}

impl Screen {
    fn set_dark(&self, dark: bool) {
        self.dark.set(dark);
        let handlers: Vec<EventHandler> = self.listeners.borrow().iter().map(|(_, h)| h.clone()).collect();
        for handler in handlers {
            handler("change");
        }
    }
}

/// A fresh view of the screen per `match_media` call, like the platform's.
struct ScreenList {
    screen: Rc<Screen>,
    media: String,
}

impl EventTarget for ScreenList {
    fn add_event_listener(&self, _: &str, handler: EventHandler, _: ListenerOptions) -> ListenerId {
        let id = ListenerId(self.screen.next.get());
        self.screen.next.set(id.0 + 1);
        self.screen.listeners.borrow_mut().push((id, handler));
        id
    }

    fn remove_event_listener(&self, _: &str, id: ListenerId, _: ListenerOptions) {
        self.screen.listeners.borrow_mut().retain(|(l, _)| *l != id);
    }
}

impl MediaQueryList for ScreenList {
    fn matches(&self) -> bool {
        self.screen.dark.get()
    }

    fn media(&self) -> String {
        self.media.clone()
    }
}

struct ScreenMatcher(Rc<Screen>);

impl MediaMatcher for ScreenMatcher {
    fn match_media(&self, query: &str) -> Rc<dyn MediaQueryList> {
        Rc::new(ScreenList {
            screen: self.0.clone(),
            media: query.to_string(),
        })
    }
}

#[test]
fn media_query_listens_through_a_list_only_it_holds() {
    let screen = Rc::new(Screen::default());
    let previous = set_media_matcher(Some(Rc::new(ScreenMatcher(screen.clone()))));

    let dark = Rc::new(MediaQuery::new("prefers-color-scheme: dark", false));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let tree = root(cloned!(dark, seen => move || {
        effect(cloned!(dark, seen => move || seen.borrow_mut().push(dark.current())));
    }));
    flush_sync();
    assert_eq!(screen.listeners.borrow().len(), 1);

    screen.set_dark(true);
    flush_sync();
    assert_eq!(*seen.borrow(), vec![false, true]);

    tree.dispose();
    tick();
    assert!(screen.listeners.borrow().is_empty());

    set_media_matcher(previous);
}
