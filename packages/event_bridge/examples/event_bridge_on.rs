//! Steps through the rows produced by a cursor-like source, one pull at a time.
//!
//! The cursor pushes a "row" event each time it is asked to continue. The consumer pulls rows
//! from an `On` sequence and asks for the next one only after handling the current one, so the
//! two sides take turns without the consumer ever registering a listener itself.

use std::cell::Cell;

use event_bridge::{Aborted, Event, EventTarget, ListenOptions, On};
use futures::StreamExt;
use futures::executor::block_on;
use tracing::Level;

#[derive(Clone, Debug)]
struct Row {
    key: u32,
    value: &'static str,
}

impl Event for Row {
    type Error = Aborted;

    fn into_error(self) -> Aborted {
        Aborted
    }
}

/// Pushes the next row when asked to continue, like a database cursor.
struct Cursor {
    target: EventTarget<Row>,
    rows: Vec<Row>,
    position: Cell<usize>,
}

impl Cursor {
    fn continue_(&self) -> bool {
        let position = self.position.get();

        let Some(row) = self.rows.get(position) else {
            return false;
        };

        self.position.set(position.wrapping_add(1));
        self.target.dispatch("row", row);
        true
    }
}

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let cursor = Cursor {
        target: EventTarget::new(),
        rows: vec![
            Row {
                key: 1,
                value: "alpha",
            },
            Row {
                key: 2,
                value: "beta",
            },
            Row {
                key: 3,
                value: "gamma",
            },
        ],
        position: Cell::new(0),
    };

    let rows = On::new(&cursor.target, "row", ListenOptions::new());

    println!("=== Stepping with next() ===");

    // The first row is requested before anyone waits for it; it is buffered until pulled.
    cursor.continue_();

    while let Ok(Some(row)) = block_on(rows.next()) {
        println!("Row {} = {}", row.key, row.value);

        if !cursor.continue_() {
            println!("Cursor exhausted");
            rows.close();
        }
    }

    println!("=== Consuming as a stream ===");

    let cursor = Cursor {
        target: EventTarget::new(),
        rows: (1..=3)
            .map(|key| Row {
                key,
                value: "streamed",
            })
            .collect(),
        position: Cell::new(0),
    };

    let rows = On::new(&cursor.target, "row", ListenOptions::new());
    while cursor.continue_() {}

    let keys: Vec<u32> = block_on(
        rows.take(3)
            .filter_map(|row| async move { row.ok().map(|row| row.key) })
            .collect(),
    );

    println!("Streamed keys: {keys:?}");
    println!(
        "Listeners left on the cursor: {}",
        cursor.target.listener_count()
    );
}
