use omamori::{establish_connection, init_schema, reset_database};

fn main() {
    let mut conn = establish_connection();
    init_schema(&mut conn).expect("Failed to initialize schema");
    reset_database(&mut conn).expect("Failed to reset database");
    println!("Database has been reset.");
}
