use partner_signature::{
    sign, signature_from_headers, InMemorySecrets, IntegrationId, Verifier, VerifierConfig,
};

#[tokio::main]
async fn main() {
    let body = serde_json::json!({"id": 123});
    let token = sign(&body, "partner-xyz", b"supersecret").unwrap_or_default();

    let headers = vec![
        ("Content-Type", "application/json"),
        ("X-Signature", token.as_str()),
    ];

    let secrets = InMemorySecrets::new().with_secret(
        IntegrationId::new("partner-xyz").expect("valid integration id"),
        "supersecret",
    );
    let verifier = Verifier::new(VerifierConfig::default().with_tolerance(60_000));

    let Some(signature) = signature_from_headers(headers.iter().map(|(k, v)| (*k, *v))) else {
        eprintln!("missing signature header");
        return;
    };

    match verifier.check(signature, &body, &secrets).await {
        Ok(()) => println!("signature valid"),
        Err(reason) => println!("signature rejected: {}", reason),
    }
}
