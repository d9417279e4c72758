//! List commands implementation

use crate::buses;

/// List all buses compiled into this binary
pub fn list_buses() {
    let buses = buses::available_buses();

    if buses.is_empty() {
        println!("No buses available (recompile with bus features enabled)");
        return;
    }

    println!("Supported buses:");
    println!();
    for bus in &buses {
        println!("  {:<10} - {}", bus.name, bus.description);
        if !bus.aliases.is_empty() {
            println!("  {:<10}   aliases: {}", "", bus.aliases.join(", "));
        }
    }
}
