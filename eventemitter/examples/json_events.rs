use serde_json::Value;

use syncemit_eventemitter::{EventEmitter, Listener};

// This example reads a stream of JSON messages, one per line, and emits each
// message under the name found in its "type" field. A "welcome" listener is
// registered with `once`, so only the first join is greeted.

const MESSAGES: &str = r#"
{"type": "join", "user": "alice"}
{"type": "message", "user": "alice", "text": "hello"}
{"type": "join", "user": "bob"}
{"type": "message", "user": "bob", "text": "hi alice"}
{"type": "leave", "user": "alice"}
{"type": "message", "user": "bob", "text": "anyone here?"}
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let event_emitter = EventEmitter::<Value>::new();

    let print_message = Listener::new(|_, msg: &Value| {
        println!("<{}> {}", field(msg, "user")?, field(msg, "text")?);
        Ok(())
    });

    let welcome = Listener::new(|_, msg: &Value| {
        println!("* {} opened the room", field(msg, "user")?);
        Ok(())
    });

    let announce_join = Listener::new(|_, msg: &Value| {
        println!("* {} joined", field(msg, "user")?);
        Ok(())
    });

    // The first leave mutes the room: later messages are no longer printed.
    let print_message_cloned = print_message.clone();
    let on_leave = Listener::new(move |emitter: &EventEmitter<Value>, msg: &Value| {
        println!("* {} left, muting the room", field(msg, "user")?);
        emitter.off(Some("message"), Some(&print_message_cloned));
        Ok(())
    });

    event_emitter
        .once("join", &welcome)
        .on("join", &announce_join)
        .on("message", &print_message)
        .on("leave", &on_leave);

    for line in MESSAGES.lines().filter(|l| !l.trim().is_empty()) {
        let msg: Value = serde_json::from_str(line)?;
        let event = msg["type"].as_str().unwrap_or_default().to_string();
        event_emitter.emit(&event, &msg)?;
    }

    println!("registered events: {:?}", event_emitter.event_names());

    Ok(())
}

fn field<'a>(msg: &'a Value, name: &str) -> Result<&'a str, String> {
    msg[name]
        .as_str()
        .ok_or_else(|| format!("missing field '{name}'"))
}
