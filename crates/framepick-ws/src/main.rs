/*!
Serve an HTML page as an embedded frame over WebSocket.

```text
framepick-ws <page.html> [port]
```

Besides the controller methods, clients can drive the page itself:

- `hover` / `click` with `{ "selector": "..." }`
- `pointer` / `click_at` with `{ "x": f64, "y": f64 }`
- `reload`
*/

use std::process::ExitCode;
use std::sync::Arc;

use framepick::{LocalFrame, Point, SelectorController};
use framepick_ws::{start_server, CustomRpcHandler, WebSocketState, DEFAULT_WS_PORT};
use serde_json::{json, Value};

fn usage() -> ExitCode {
  eprintln!("usage: framepick-ws <page.html> [port]");
  ExitCode::FAILURE
}

fn selector_arg(args: &Value) -> Result<&str, Value> {
  args
    .get("selector")
    .and_then(Value::as_str)
    .ok_or_else(|| json!({ "error": "Missing 'selector' argument" }))
}

fn point_arg(args: &Value) -> Result<Point, Value> {
  let coord = |key: &str| args.get(key).and_then(Value::as_f64);
  match (coord("x"), coord("y")) {
    (Some(x), Some(y)) => Ok(Point::new(x, y)),
    _ => Err(json!({ "error": "Expected numeric 'x' and 'y'" })),
  }
}

fn page_handler(frame: LocalFrame, controller: SelectorController<LocalFrame>) -> CustomRpcHandler {
  Arc::new(move |method, args| {
    let response = match method {
      "hover" => match selector_arg(args) {
        Ok(selector) => match frame.hover_selector(selector) {
          Ok(_) => json!({ "result": null }),
          Err(e) => json!({ "error": e.to_string() }),
        },
        Err(e) => e,
      },
      "click" => match selector_arg(args) {
        Ok(selector) => match frame.click_selector(selector) {
          Ok(disposition) => json!({ "result": { "consumed": disposition.default_prevented } }),
          Err(e) => json!({ "error": e.to_string() }),
        },
        Err(e) => e,
      },
      "pointer" => match point_arg(args) {
        Ok(point) => {
          frame.move_pointer(point);
          json!({ "result": null })
        }
        Err(e) => e,
      },
      "click_at" => match point_arg(args) {
        Ok(point) => match frame.click_at(point) {
          Some(disposition) => json!({ "result": { "consumed": disposition.default_prevented } }),
          None => json!({ "result": null }),
        },
        Err(e) => e,
      },
      "reload" => {
        if frame.reload() {
          controller.on_frame_loaded();
          json!({ "result": true })
        } else {
          json!({ "result": false })
        }
      }
      _ => return None,
    };
    Some(response)
  })
}

#[tokio::main]
async fn main() -> ExitCode {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  let mut args = std::env::args().skip(1);
  let Some(page) = args.next() else {
    return usage();
  };
  let port = match args.next().map(|p| p.parse::<u16>()) {
    None => DEFAULT_WS_PORT,
    Some(Ok(port)) => port,
    Some(Err(e)) => {
      log::error!("Invalid port: {e}");
      return usage();
    }
  };

  let markup = match std::fs::read_to_string(&page) {
    Ok(markup) => markup,
    Err(e) => {
      log::error!("Failed to read {page}: {e}");
      return ExitCode::FAILURE;
    }
  };

  let frame = LocalFrame::new();
  frame.load_html(&markup, &page);

  let controller = SelectorController::<LocalFrame>::builder()
    .on_element_selected(|element| log::info!("Selected {}", element.css_path))
    .on_element_hover(|element| log::debug!("Hovering {}", element.css_path))
    .build();
  controller.initialize(frame.clone());
  let _listener = controller.listen(frame.subscribe());

  let ws_state = WebSocketState::with_port(controller.clone(), port)
    .with_custom_handler(page_handler(frame, controller));

  match start_server(ws_state).await {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      log::error!("WebSocket server stopped: {e}");
      ExitCode::FAILURE
    }
  }
}
