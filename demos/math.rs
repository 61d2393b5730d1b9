//! Math service - request/response over TCP.
//!
//! This example demonstrates:
//! - Declaring command schemas with typed arguments and error codes
//! - Serving them with the builder pattern
//! - Calling them from the other end, including a declared error
//!
//! # Running
//!
//! ```text
//! cargo run --example math -- server 127.0.0.1:7777
//! cargo run --example math -- client 127.0.0.1:7777
//! ```
//!
//! Set `RUST_LOG=ampwire=debug` to watch the boxes go by.

use ampwire::codec::{Argument, Values};
use ampwire::handler::ResponderError;
use ampwire::{Amp, AmpError, Command};
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::EnvFilter;

fn add() -> Command {
    Command::builder("add")
        .argument("a", Argument::Integer)
        .argument("b", Argument::Integer)
        .response("total", Argument::Integer)
        .build()
}

fn divide() -> Command {
    Command::builder("divide")
        .argument("numerator", Argument::Integer)
        .argument("denominator", Argument::Integer)
        .response("result", Argument::Float)
        .error("ZeroDivision", "ZERO_DIVISION")
        .build()
}

async fn serve(addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::info!("Accepted {}", peer);

        let amp = Amp::builder()
            .responder(add(), |args: Values| async move {
                let a = args.get_int("a").unwrap_or(0);
                let b = args.get_int("b").unwrap_or(0);
                Ok(Values::new().with("total", a + b))
            })
            .responder(divide(), |args: Values| async move {
                let n = args.get_int("numerator").unwrap_or(0);
                let d = args.get_int("denominator").unwrap_or(0);
                if d == 0 {
                    return Err(ResponderError::new("ZeroDivision", "divide by zero"));
                }
                Ok(Values::new().with("result", n as f64 / d as f64))
            })
            .start(stream);

        tokio::spawn(async move {
            let reason = amp.wait_closed().await;
            tracing::info!("{} disconnected: {}", peer, reason);
        });
    }
}

async fn call(addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let stream = TcpStream::connect(addr).await?;
    let amp = Amp::builder().start(stream);

    let total = amp
        .call_remote(&add(), &Values::new().with("a", 3).with("b", 4))?
        .await?;
    println!("3 + 4 = {}", total.get_int("total").unwrap_or_default());

    let quotient = amp
        .call_remote(
            &divide(),
            &Values::new().with("numerator", 1).with("denominator", 8),
        )?
        .await?;
    println!("1 / 8 = {}", quotient.get_float("result").unwrap_or_default());

    match amp
        .call_remote(
            &divide(),
            &Values::new().with("numerator", 1).with("denominator", 0),
        )?
        .await
    {
        Err(AmpError::Remote(e)) => println!("1 / 0 failed: {} ({})", e.kind, e.code),
        other => println!("1 / 0 returned {:?}", other),
    }

    amp.close();
    amp.wait_closed().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let mode = args.next().unwrap_or_else(|| "client".into());
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:7777".into());

    match mode.as_str() {
        "server" => serve(&addr).await,
        "client" => call(&addr).await,
        other => Err(format!("unknown mode {other:?}, expected server or client").into()),
    }
}
