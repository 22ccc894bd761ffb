use crate::display::ChartFrame;
use crate::service_mode::PanelVisibility;
use dioxus::core::NoOpMutations;
use dioxus::prelude::*;

#[derive(Props, Clone, PartialEq)]
pub struct AppProps {
    pub device_host: String,
    pub latest: Option<String>,
    pub service_panel: bool,
}

pub fn render_html(device_host: &str, frame: &ChartFrame, panel: PanelVisibility) -> String {
    let mut app = VirtualDom::new_with_props(
        App,
        AppProps {
            device_host: device_host.to_string(),
            latest: frame.latest.clone(),
            service_panel: panel.is_shown(),
        },
    );
    // Build the tree before rendering to avoid SSR panics.
    let mut noop = NoOpMutations {};
    let _ = app.rebuild(&mut noop);
    dioxus_ssr::render(&mut app)
}

const STYLES: &str = r#"
* { box-sizing: border-box; }
body, html {
    margin: 0;
    padding: 0;
    background: radial-gradient(circle at 20% 20%, #13201f, #0a0f0f 40%), #0a0f0f;
}
.page { min-height: 100vh; display: flex; justify-content: center; padding: 36px 18px; color: #e6f2ef; font-family: "Space Grotesk", "Inter", system-ui, -apple-system, sans-serif; }
.shell { width: min(900px, 100%); display: flex; flex-direction: column; gap: 12px; }
.header { display: flex; flex-direction: column; gap: 6px; }
.title { font-size: 26px; margin: 0; letter-spacing: 0.4px; }
.subtitle { margin: 0; color: #96b0aa; font-size: 15px; }
.tag { display: inline-flex; align-items: center; gap: 8px; width: fit-content; padding: 8px 12px; border-radius: 999px; background: #0f1817; border: 1px solid #1d2e2b; color: #c2dcd6; font-size: 14px; }
.card { width: 100%; background: linear-gradient(145deg, #142120, #0e1615); border: 1px solid #1d2e2b; border-radius: 16px; padding: 22px; box-shadow: 0 18px 44px rgba(0,0,0,0.35); }
.card.hidden { display: none; }
.card-title { margin: 0 0 4px 0; font-size: 20px; }
.muted { color: #87a29c; margin: 0 0 16px 0; font-size: 14px; }
.reading { display: flex; align-items: baseline; gap: 8px; }
.reading-value { font-size: 56px; font-weight: 800; letter-spacing: 0.5px; color: #4bc0c0; }
.reading-unit { font-size: 22px; color: #96b0aa; }
.chart { width: 100%; height: 280px; display: block; }
.primary { width: 100%; padding: 14px 16px; border-radius: 12px; border: none; background: linear-gradient(135deg, #4bc0c0, #2a9d9d); color: #071010; font-weight: 800; font-size: 16px; letter-spacing: 0.3px; box-shadow: 0 12px 30px rgba(75,192,192,0.3); cursor: pointer; }
.primary:disabled { opacity: 0.6; cursor: not-allowed; }
.status { margin-top: 10px; color: #87a29c; font-size: 14px; min-height: 18px; }
@media (max-width: 640px) {
    .page { padding: 20px 14px; }
    .card { padding: 18px; }
    .title { font-size: 22px; }
    .reading-value { font-size: 44px; }
}
"#;

const SCRIPT: &str = r#"
(() => {
  const temperature = document.getElementById('temperature');
  const linkStatus = document.getElementById('link-status');
  const canvas = document.getElementById('chart');
  const activate = document.getElementById('activate-btn');
  const serviceStatus = document.getElementById('service-status');
  const linkText = { connecting: 'Connecting to device...', open: 'Live', closed: 'Device connection closed' };
  let frame = { latest: null, labels: [], values: [], link: 'connecting' };

  function render(next) {
    frame = next;
    temperature.textContent = frame.latest ?? '--';
    linkStatus.textContent = linkText[frame.link] || frame.link;
    drawChart();
  }

  function drawChart() {
    const ctx = canvas.getContext('2d');
    const ratio = window.devicePixelRatio || 1;
    const width = canvas.clientWidth;
    const height = canvas.clientHeight;
    canvas.width = width * ratio;
    canvas.height = height * ratio;
    ctx.setTransform(ratio, 0, 0, ratio, 0, 0);
    ctx.clearRect(0, 0, width, height);

    const values = frame.values;
    if (!values.length) return;
    const pad = { left: 48, right: 12, top: 12, bottom: 28 };
    let min = Math.min(...values);
    let max = Math.max(...values);
    if (min === max) { min -= 1; max += 1; }
    const plotW = width - pad.left - pad.right;
    const plotH = height - pad.top - pad.bottom;
    const x = (i) => pad.left + (values.length === 1 ? plotW / 2 : (i / (values.length - 1)) * plotW);
    const y = (v) => pad.top + (1 - (v - min) / (max - min)) * plotH;

    ctx.font = '11px system-ui, sans-serif';
    ctx.fillStyle = '#87a29c';
    ctx.fillText(max.toFixed(2), 4, pad.top + 8);
    ctx.fillText(min.toFixed(2), 4, pad.top + plotH);
    ctx.fillText(frame.labels[0] || '', pad.left, height - 8);
    const lastLabel = frame.labels[frame.labels.length - 1] || '';
    ctx.fillText(lastLabel, width - pad.right - ctx.measureText(lastLabel).width, height - 8);

    ctx.beginPath();
    values.forEach((v, i) => (i === 0 ? ctx.moveTo(x(i), y(v)) : ctx.lineTo(x(i), y(v))));
    ctx.strokeStyle = 'rgba(75, 192, 192, 1)';
    ctx.lineWidth = 1.5;
    ctx.stroke();
    ctx.lineTo(x(values.length - 1), pad.top + plotH);
    ctx.lineTo(x(0), pad.top + plotH);
    ctx.closePath();
    ctx.fillStyle = 'rgba(75, 192, 192, 0.2)';
    ctx.fill();
  }

  async function loadSnapshot() {
    try {
      const res = await fetch('/api/telemetry');
      if (!res.ok) throw new Error('snapshot failed');
      render(await res.json());
    } catch (err) {
      console.error('Unable to load telemetry snapshot', err);
    }
  }

  function openSocket() {
    const proto = location.protocol === 'https:' ? 'wss' : 'ws';
    const ws = new WebSocket(`${proto}://${location.host}/ws/telemetry`);
    ws.onmessage = (evt) => {
      try {
        render(JSON.parse(evt.data));
      } catch (err) {
        console.error('Bad chart frame', err);
      }
    };
    ws.onerror = (err) => console.error('WebSocket error', err);
    ws.onclose = () => {
      console.warn('WebSocket connection closed.');
      linkStatus.textContent = 'Dashboard connection closed';
    };
  }

  activate?.addEventListener('click', async () => {
    activate.disabled = true;
    serviceStatus.textContent = 'Requesting service mode...';
    let outcome;
    try {
      const res = await fetch('/api/service-mode/activate', { method: 'POST' });
      outcome = await res.json();
    } catch (err) {
      outcome = { status: 'failed', reason: String(err) };
    } finally {
      activate.disabled = false;
    }
    if (outcome.status === 'ok') {
      serviceStatus.textContent = '';
      alert(outcome.value);
    } else {
      serviceStatus.textContent = `Activation failed: ${outcome.reason}`;
      alert(`Activation failed: ${outcome.reason}`);
    }
  });

  window.addEventListener('resize', drawChart);
  loadSnapshot();
  openSocket();
})();
"#;

#[component]
fn App(props: AppProps) -> Element {
    let latest = props.latest.clone().unwrap_or_else(|| "--".to_string());
    let panel_class = if props.service_panel {
        "card"
    } else {
        "card hidden"
    };

    rsx! {
        div { class: "page",
            meta { name: "viewport", content: "width=device-width, initial-scale=1" }
            div { class: "shell",
                div { class: "header",
                    h1 { class: "title", "Thermoscope" }
                    p { class: "subtitle", "Live temperature telemetry" }
                    div { class: "tag", "Device {props.device_host}" }
                }
                div { class: "card",
                    h2 { class: "card-title", "Temperature" }
                    div { class: "reading",
                        span { id: "temperature", class: "reading-value", "{latest}" }
                        span { class: "reading-unit", "°C" }
                    }
                    div { id: "link-status", class: "status", "Connecting to device..." }
                }
                div { class: "card",
                    h2 { class: "card-title", "Last 30 readings" }
                    canvas { id: "chart", class: "chart" }
                    p { class: "muted",
                        a { href: "/api/series.csv", "Download CSV" }
                    }
                }
                div { id: "service-mode", class: "{panel_class}",
                    h2 { class: "card-title", "Service mode" }
                    p { class: "muted", "The device reports service mode is available." }
                    button { id: "activate-btn", class: "primary", "Activate service mode" }
                    div { id: "service-status", class: "status" }
                }
            }
        }
        style { dangerous_inner_html: STYLES }
        script { dangerous_inner_html: SCRIPT }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::LinkState;

    fn frame(latest: Option<&str>) -> ChartFrame {
        ChartFrame {
            latest: latest.map(str::to_string),
            labels: Vec::new(),
            values: Vec::new(),
            link: LinkState::Connecting,
        }
    }

    #[test]
    fn shown_panel_is_not_hidden() {
        let html = render_html("10.0.0.5", &frame(Some("21.50")), PanelVisibility::Shown);
        assert!(html.contains("service-mode"));
        assert!(!html.contains("card hidden"));
        assert!(html.contains("21.50"));
        assert!(html.contains("Device 10.0.0.5"));
    }

    #[test]
    fn hidden_panel_carries_hidden_class() {
        let html = render_html("10.0.0.5", &frame(None), PanelVisibility::Hidden);
        assert!(html.contains("card hidden"));
        assert!(html.contains(">--<"));
    }
}
