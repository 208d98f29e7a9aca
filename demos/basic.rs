use partner_signature::{sign, SIGNATURE_HEADER};

fn main() {
    let body = serde_json::json!({
        "userId": "12345",
        "action": "create_booking",
        "data": {"location": "parking_lot_a", "duration": 120}
    });

    match sign(&body, "partner-xyz", b"super-secret-key-12345") {
        Ok(token) => println!("{}: {}", SIGNATURE_HEADER, token),
        Err(err) => eprintln!("cannot sign request: {}", err),
    }
}
