//! Manual end-to-end smoke run: declare a schema, inspect the mapped native
//! validator, push a request through the handler wrapper, and print every
//! stage. Not a test; a console for poking at the library during
//! development.

use anyhow::{Result, anyhow};
use serde_json::json;

use schema_wire::{Handler, Mapper, Value, WireError, default_registry, schema};
use schema_wire::value::millis_to_datetime;

fn event_args() -> schema_wire::Schema {
    schema::object([
        ("title", schema::string()),
        ("starts_at", schema::date()),
        ("capacity", schema::with_default(schema::int64(), Value::Int64(100))),
        ("tags", schema::array(schema::string())),
        ("visibility", schema::string_enum(["public", "unlisted", "private"])),
        ("notes", schema::optional(schema::nullable(schema::string()))),
    ])
}

fn event_returns() -> schema_wire::Schema {
    schema::object([
        ("id", schema::string()),
        ("created_at", schema::date()),
        ("capacity", schema::int64()),
    ])
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let registry = default_registry();
    let handler = Handler::new(registry, event_args(), Some(event_returns()));

    println!("== native validators (registration payloads) ==");
    println!("{}", serde_json::to_string_pretty(&handler.args_validator())?);
    let (_, defaults) = Mapper::new(registry).to_validator_with_defaults(&event_args());
    println!("defaults side channel: {defaults:?}");

    let wire_args = json!({
        "title": "launch party",
        "starts_at": 1_704_067_200_000_i64,
        "tags": ["team", "offsite"],
        "visibility": "unlisted",
        "notes": null,
    });
    println!("\n== wire args ==\n{wire_args:#}");

    let wire_result = handler
        .call(&wire_args, |args| async move {
            let Value::Object(members) = args else {
                return Err(WireError::handler("object expected"));
            };
            println!("\n== decoded + parsed args (handler view) ==\n{members:#?}");
            Ok(Value::object([
                ("id", Value::from("evt_1")),
                (
                    "created_at",
                    Value::DateTime(
                        millis_to_datetime(1_704_070_800_000)
                            .ok_or_else(|| WireError::handler("bad clock"))?,
                    ),
                ),
                ("capacity", members["capacity"].clone()),
            ]))
        })
        .await
        .map_err(|e| anyhow!(e))?;

    println!("\n== wire result ==\n{wire_result:#}");

    // Rejection path: missing required field, wrong enum value.
    let bad = json!({"starts_at": 0, "visibility": "secret", "tags": []});
    match handler.call(&bad, |_| async { Ok(Value::Null) }).await {
        Ok(_) => println!("\nunexpected: bad args accepted"),
        Err(e) => println!("\n== rejection ==\n{e}"),
    }

    Ok(())
}
