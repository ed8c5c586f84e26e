use std::time::Duration;

use ttlkit::builder::CacheBuilder;

fn main() {
    let cache = CacheBuilder::new()
        .bucket_count(4)
        .sweep_interval(Duration::from_millis(50))
        .min_sweep_interval(Duration::from_millis(50))
        .build::<String>();

    cache.set("greeting", "hello".to_string(), None);
    cache.set("token", "abc123".to_string(), Some(Duration::from_millis(100)));

    cache.set_with_callback(
        "session",
        "alice".to_string(),
        Some(Duration::from_millis(100)),
        Box::new(|element, reason| {
            println!("removed {} ({reason})", element.key());
        }),
    );

    if let Some(value) = cache.get("token") {
        println!("hit token: {value}");
    }

    std::thread::sleep(Duration::from_millis(300));

    println!("token after expiry: {:?}", cache.get("token"));
    println!("live keys: {:?}", {
        let mut keys = cache.keys("");
        keys.sort();
        keys
    });

    cache.stop();
}

// Expected output:
// hit token: abc123
// removed session (expired)
// token after expiry: None
// live keys: ["greeting"]
//
// Explanation: "token" and "session" carry a 100ms TTL; the sweeper
// reclaims them and fires the session callback with reason Expired.
// The immortal "greeting" entry survives.
