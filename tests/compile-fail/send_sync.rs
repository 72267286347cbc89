// Check that non-Sync value types can't be held in a Tsv.
// edition:2021

use std::cell::RefCell;

use tsv::Tsv;

fn main() {
    let tsv = Tsv::new();
    tsv.set(RefCell::new(0)).unwrap();
    //~^ ERROR: `RefCell<i32>` cannot be shared between threads safely
}
