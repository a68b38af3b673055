//! Interactive host shell
//!
//! ```text
//! graft> load ./foo.zip
//! graft> get /foo/hello -H X-Token:abc
//! graft> reload foo
//! graft> list
//! ```

use graft_core::{ModuleManagement, Request, RequestRouter};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const HELP: &str = "\
Commands:
  load <archive>              load (or reload) a module archive
  unload <identity>           unload a module
  reload <identity>           reload a module from its last artifact
  list [--json]               list active modules
  get <uri> [-H name:value]   dispatch a GET request
  post <uri> [body] [-H ..]   dispatch a POST request
  events [identity]           show recent module events
  help                        show this help
  quit                        unload everything and exit";

/// 셸 루프 (stdin EOF 또는 quit까지)
pub async fn run(management: &ModuleManagement, router: &RequestRouter) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("graft shell - type 'help' for commands");
    loop {
        stdout.write_all(b"graft> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(words) = shlex::split(line.trim()) else {
            println!("unbalanced quotes");
            continue;
        };
        let Some((command, rest)) = words.split_first() else {
            continue;
        };

        match command.as_str() {
            "load" => match rest.first() {
                Some(path) => println!("{}", management.load_module(&expand_home(path)).await),
                None => println!("usage: load <archive>"),
            },
            "unload" => match rest.first() {
                Some(identity) => println!("{}", management.unload_module(identity).await),
                None => println!("usage: unload <identity>"),
            },
            "reload" => match rest.first() {
                Some(identity) => println!("{}", management.reload_module(identity).await),
                None => println!("usage: reload <identity>"),
            },
            "list" => print_modules(management, rest.iter().any(|a| a == "--json")),
            "get" | "post" => dispatch(router, command, rest).await,
            "events" => print_events(management, rest.first().map(String::as_str)),
            "help" => println!("{}", HELP),
            "quit" | "exit" => break,
            other => println!("unknown command '{}', type 'help'", other),
        }
    }
    Ok(())
}

fn print_modules(management: &ModuleManagement, json: bool) {
    let modules = management.list_modules();
    if json {
        match serde_json::to_string_pretty(&modules) {
            Ok(text) => println!("{}", text),
            Err(e) => println!("error: {}", e),
        }
        return;
    }
    if modules.is_empty() {
        println!("No active modules.");
        return;
    }
    println!("{:<16} {:<16} {:<10} {:<10}", "IDENTITY", "GENERATION", "STATE", "COMPONENTS");
    for module in modules {
        println!(
            "{:<16} {:<16} {:<10} {:<10}",
            module.identity, module.generation, module.state, module.components
        );
    }
}

fn print_events(management: &ModuleManagement, identity: Option<&str>) {
    let bus = management.manager().event_bus();
    let events = match identity {
        Some(identity) => bus.history_for(identity),
        None => bus.history(),
    };
    for event in events.iter().rev().take(20).rev() {
        if event.detail.is_null() {
            println!("{} {}", event.timestamp.format("%H:%M:%S"), event);
        } else {
            println!(
                "{} {} {}",
                event.timestamp.format("%H:%M:%S"),
                event,
                event.detail
            );
        }
    }
}

async fn dispatch(router: &RequestRouter, method: &str, args: &[String]) {
    let Some(uri) = args.first() else {
        println!("usage: {} <uri> [-H name:value]", method);
        return;
    };
    let mut request = match Request::new(method, uri) {
        Ok(request) => request,
        Err(e) => {
            println!("{}", e);
            return;
        }
    };

    let mut rest = args[1..].iter();
    while let Some(arg) = rest.next() {
        if arg == "-H" {
            match rest.next().and_then(|h| h.split_once(':')) {
                Some((name, value)) => request = request.with_header(name.trim(), value.trim()),
                None => {
                    println!("expected -H name:value");
                    return;
                }
            }
        } else {
            request = request.with_body(arg.as_str());
        }
    }

    match router.dispatch(request).await {
        Ok(response) => {
            println!("{}", response.status);
            for (name, value) in &response.headers {
                println!("{}: {}", name, value);
            }
            println!("{}", response.body);
        }
        Err(e) => println!("error: {}", e),
    }
}

/// `~/` 접두사를 홈 디렉토리로 확장
fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
