use gc_core::{GcUpvalue, Value};
use std::mem::size_of;

fn main() {
    println!("=== Size Check ===");
    println!("Value: {} bytes", size_of::<Value>());
    println!("GcUpvalue: {} bytes", size_of::<GcUpvalue>());
}
