//! Basic usage example for resultstore
//!
//! This example demonstrates the fundamental operations:
//! - Declaring a schema with a repeated sub-block
//! - Writing one domain batch per load case
//! - Finalizing the indexes
//! - Searching by domain and entity id, with and without a filter

use resultstore::{Database, FieldDef, Filter, Options, ScalarType, Schema, TableDef, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::init();

    // Element stresses at two layers, with a status flag per element
    let schema = Schema::new(vec![
        FieldDef::scalar("EID", ScalarType::Int64),
        FieldDef::scalar("STATUS", ScalarType::Text(4)),
        FieldDef::block(
            "LAYER",
            vec![
                FieldDef::scalar("SX", ScalarType::Float64),
                FieldDef::scalar("SY", ScalarType::Float64),
            ],
            2,
        ),
    ]);
    let def = TableDef::new("/RESULT/ELEMENTAL/STRESS", "QUAD4", &schema)?
        .with_results_type("STRESSES");

    // Open database (will be created if it doesn't exist)
    let mut db = Database::open("./example_data", Options::default())?;
    println!("Database opened at {:?}", db.path());

    let table = db.table(def)?;
    println!("Columns: {:?}", table.schema().columns().iter().map(|c| &c.name).collect::<Vec<_>>());

    // Three load cases over the same five elements
    println!("Writing data...");
    for load_case in 1..=3 {
        let scale = load_case as f64;
        let records: Vec<Vec<Value>> = (1..=5)
            .map(|eid| {
                let status = if eid % 2 == 0 { "WARN" } else { "OK" };
                vec![
                    Value::Int(eid * 100),
                    Value::Int(0), // reserved position
                    Value::from(status),
                    Value::Float(scale * eid as f64),
                    Value::Float(-scale),
                    Value::Float(scale * 2.0),
                    Value::Float(0.5),
                ]
            })
            .collect();
        let domain = table.write(&records)?;
        println!("  load case {} -> domain {:?}", load_case, domain);
    }

    table.finalize()?;
    println!("Finalized {} rows in {} domains", table.num_rows(), table.domain_count());

    // Search
    println!("Elements 200 and 300 in domains 1 and 3:");
    for row in table.search(&[1, 3], &[200, 300], None)? {
        println!("  {:?}", row);
    }

    let filter = Filter::new().accept("STATUS", ["WARN"]);
    println!("Same search, STATUS = WARN only:");
    for row in table.search(&[1, 3], &[200, 300], Some(&filter))? {
        println!("  {:?}", row);
    }

    // Close database
    db.close()?;
    println!("Database closed");

    Ok(())
}
