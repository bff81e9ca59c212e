//! Reference resources and resource templates.

use serde_json::{json, Value};

use warden_contracts::schema::InputSchema;
use warden_core::entry::{CapabilityEntry, HandlerError, Invocation};

const HELLO: &str = "Hello, from Warden Template Server!";

const JOKE: &str = "A neutron walks into a bar and says 'I'd like a beer please, how much?', \
                    the bartender says 'for you, no charge.' ";

fn text(body: &'static str) -> impl Fn(&Invocation<'_>) -> Result<Value, HandlerError> {
    move |_: &Invocation<'_>| Ok(Value::String(body.to_string()))
}

pub fn hello_world() -> CapabilityEntry {
    CapabilityEntry::resource("resource://hello_world", text(HELLO))
        .with_description("Provides a message")
        .with_mime_type("text/plain")
}

pub fn hello_world_v2() -> CapabilityEntry {
    CapabilityEntry::resource("resource://hello_world_v2", |_: &Invocation<'_>| {
        Ok(Value::String(format!("{HELLO} (v2)")))
    })
    .with_name("Greetings Resource")
    .with_description("Provides a message")
    .with_mime_type("text/plain")
}

pub fn tell_a_joke() -> CapabilityEntry {
    CapabilityEntry::resource("resource://tell_a_joke", text(JOKE))
        .with_description("Provides a joke")
        .with_mime_type("text/plain")
}

fn current_weather(call: &Invocation<'_>) -> Result<Value, HandlerError> {
    let city = call.str_arg("city")?;
    Ok(json!({
        "city": city,
        "temperature": 20,
        "description": "Sunny",
        "units": "C"
    }))
}

fn past_weather(call: &Invocation<'_>) -> Result<Value, HandlerError> {
    let city = call.str_arg("city")?;
    let date = call.str_arg("date")?;
    Ok(json!({
        "city": city,
        "date": date,
        "temperature": 15,
        "description": "Cloudy",
        "units": "C"
    }))
}

pub fn weather_current() -> CapabilityEntry {
    CapabilityEntry::resource_template("weather://{city}/current", current_weather)
        .with_name("current_weather")
        .with_description("Provide the current weather for a given city.")
        .with_mime_type("application/json")
        .with_input_schema(InputSchema::required_strings(&["city"]))
}

pub fn weather_past() -> CapabilityEntry {
    CapabilityEntry::resource_template("weather://{city}/{date}/past_weather", past_weather)
        .with_name("past_weather")
        .with_description("Provide the past weather for a given city and date.")
        .with_mime_type("application/json")
        .with_input_schema(InputSchema::required_strings(&["city", "date"]))
}

pub fn all() -> Vec<CapabilityEntry> {
    vec![
        hello_world(),
        hello_world_v2(),
        tell_a_joke(),
        weather_current(),
        weather_past(),
    ]
}
