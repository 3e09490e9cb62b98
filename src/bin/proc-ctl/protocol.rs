//! JSON-lines request/reply loop over the dispatcher

use std::io::{self, BufRead, Write};
use std::sync::Mutex;
use std::thread;

use futures::executor::block_on;
use futures::future::BoxFuture;
use log::{debug, warn};
use proc_runner::{Convention, Dispatcher, ProcError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Option<u64>,
    pub op: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Reply {
    fn from_result(id: Option<u64>, result: proc_runner::Result<Value>) -> Self {
        match result {
            Ok(value) => Reply {
                id,
                ok: Some(value),
                error: None,
            },
            Err(e) => Reply {
                id,
                ok: None,
                error: Some(ErrorBody {
                    kind: e.kind(),
                    message: e.to_string(),
                }),
            },
        }
    }
}

/// A parsed request, either answered already or still running
pub enum Pending {
    Ready(Reply),
    Deferred {
        id: Option<u64>,
        future: BoxFuture<'static, proc_runner::Result<Value>>,
    },
}

impl Pending {
    /// Block until the reply is available
    pub fn wait(self) -> Reply {
        match self {
            Pending::Ready(reply) => reply,
            Pending::Deferred { id, future } => Reply::from_result(id, block_on(future)),
        }
    }
}

/// Parse one request line and start its operation. Sync operations are
/// answered here; async ones come back as a future to be awaited elsewhere.
pub fn accept(dispatcher: &Dispatcher, line: &str) -> Pending {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            return Pending::Ready(Reply::from_result(
                None,
                Err(ProcError::InvalidArgument(format!("malformed request: {}", e))),
            ));
        }
    };

    debug!("request id={:?} op={}", request.id, request.op);
    let deferred = matches!(
        dispatcher.registry().lookup(&request.op).map(|kind| kind.convention()),
        Ok(Convention::Async)
    );
    if deferred {
        Pending::Deferred {
            id: request.id,
            future: dispatcher.send(&request.op, request.args),
        }
    } else {
        Pending::Ready(Reply::from_result(
            request.id,
            dispatcher.send_sync(&request.op, request.args),
        ))
    }
}

fn write_reply<W: Write>(output: &Mutex<W>, reply: &Reply) -> io::Result<()> {
    let mut output = output.lock().unwrap_or_else(|poison| poison.into_inner());
    serde_json::to_writer(&mut *output, reply)?;
    output.write_all(b"\n")?;
    output.flush()
}

/// Serve requests until `input` is exhausted.
///
/// Deferred operations resolve on their own threads and are answered when
/// they complete, so replies may come back out of request order; match them
/// by `id`. Returns once every accepted request has been answered.
pub fn serve<R, W>(dispatcher: &Dispatcher, input: R, output: W) -> io::Result<()>
where
    R: BufRead,
    W: Write + Send,
{
    let output = Mutex::new(output);

    thread::scope(|scope| {
        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match accept(dispatcher, &line) {
                Pending::Ready(reply) => write_reply(&output, &reply)?,
                pending => {
                    let output = &output;
                    scope.spawn(move || {
                        if let Err(e) = write_reply(output, &pending.wait()) {
                            warn!("failed to write deferred reply: {}", e);
                        }
                    });
                }
            }
        }
        Ok(())
    })
}
