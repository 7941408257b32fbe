//! Microsoft Excel driven through COM from a hidden PowerShell process.
//!
//! COM objects cannot outlive the process that created them, so one
//! PowerShell child lives exactly as long as one [`ExcelSession`]. The child
//! runs `excel_driver.ps1` (passed via `-EncodedCommand`, so nothing is
//! written to disk) and speaks a line protocol over stdin/stdout: one JSON
//! [`DriverCommand`] per line in, one JSON reply per line out.
//!
//! Any text the driver prints that is not a JSON object is skipped, which
//! keeps stray COM return values from desynchronising the protocol.

use super::{AutomationHost, HostSession};
use crate::config::{ExportOptions, PageSetup};
use crate::error::Sheet2PdfError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

const DRIVER_SCRIPT: &str = include_str!("excel_driver.ps1");

/// Exits 0 when the Excel COM server is registered, 3 otherwise.
const PROBE_SCRIPT: &str = "if ([Type]::GetTypeFromProgID('Excel.Application')) { exit 0 } else { exit 3 }";

/// How long a dropped session waits for the driver to exit before killing it.
const DRIVER_EXIT_GRACE: Duration = Duration::from_secs(5);

/// The Excel automation host.
#[derive(Debug)]
pub struct ExcelHost {
    powershell: PathBuf,
    verified: AtomicBool,
}

impl Default for ExcelHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ExcelHost {
    /// Use `powershell` from `PATH`.
    pub fn new() -> Self {
        Self::with_powershell("powershell")
    }

    /// Use a specific PowerShell executable (e.g. `pwsh.exe`).
    pub fn with_powershell(path: impl Into<PathBuf>) -> Self {
        Self {
            powershell: path.into(),
            verified: AtomicBool::new(false),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.powershell);
        cmd.args([
            "-NoLogo",
            "-NoProfile",
            "-NonInteractive",
            "-ExecutionPolicy",
            "Bypass",
        ]);
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(0x0800_0000); // CREATE_NO_WINDOW
        }
        cmd
    }
}

impl AutomationHost for ExcelHost {
    fn name(&self) -> &str {
        "excel"
    }

    fn platform_supported(&self) -> bool {
        cfg!(windows)
    }

    fn check_available(&self) -> Result<(), Sheet2PdfError> {
        if self.verified.load(Ordering::Acquire) {
            return Ok(());
        }

        let output = self
            .command()
            .args(["-Command", PROBE_SCRIPT])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Sheet2PdfError::AutomationUnavailable {
                detail: format!("cannot run '{}': {}", self.powershell.display(), e),
            })?;

        if !output.status.success() {
            return Err(Sheet2PdfError::AutomationUnavailable {
                detail: format!(
                    "Excel.Application is not registered (exit {:?}). Is Microsoft Excel installed?",
                    output.status.code()
                ),
            });
        }

        self.verified.store(true, Ordering::Release);
        debug!("Excel COM server verified");
        Ok(())
    }

    fn launch(&self) -> Result<Box<dyn HostSession>, Sheet2PdfError> {
        let session = ExcelSession::spawn(self.command())?;
        Ok(Box::new(session))
    }
}

// ── Wire protocol ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum DriverCommand<'a> {
    Open {
        path: &'a Path,
    },
    SheetCount,
    SheetName {
        index: usize,
    },
    PageSetup {
        index: usize,
        orientation: i32,
        fit_wide: u32,
        fit_tall: Option<u32>,
    },
    Export {
        index: usize,
        path: &'a Path,
        quality: i32,
        include_doc_properties: bool,
        ignore_print_areas: bool,
        open_after_publish: bool,
    },
    Close {
        save_changes: bool,
    },
    Quit,
}

#[derive(Debug, Deserialize)]
struct DriverReply {
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

/// Parse one stdout line. `None` means the line is not a protocol reply.
fn parse_reply(line: &str) -> Option<Result<serde_json::Value, Sheet2PdfError>> {
    let line = line.trim();
    if !line.starts_with('{') {
        return None;
    }
    let reply: DriverReply = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            return Some(Err(Sheet2PdfError::automation(format!(
                "unreadable reply from automation host: {e}"
            ))))
        }
    };
    if reply.ok {
        Some(Ok(reply.value))
    } else {
        Some(Err(Sheet2PdfError::automation(
            reply
                .error
                .unwrap_or_else(|| "automation host reported an unknown error".to_string()),
        )))
    }
}

/// Serialise a command as one line of pure ASCII.
///
/// PowerShell decodes redirected stdin with the console code page, so every
/// non-ASCII character is written as a JSON `\uXXXX` escape (UTF-16 units).
/// serde_json only emits non-ASCII inside string literals, where the escape
/// is equivalent.
fn encode_command_line(command: &DriverCommand<'_>) -> Result<String, Sheet2PdfError> {
    let json = serde_json::to_string(command)
        .map_err(|e| Sheet2PdfError::Internal(format!("driver command encoding: {e}")))?;
    if json.is_ascii() {
        return Ok(json);
    }
    let mut line = String::with_capacity(json.len() + 16);
    for c in json.chars() {
        if c.is_ascii() {
            line.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                line.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    Ok(line)
}

/// PowerShell's `-EncodedCommand` takes base64 of UTF-16LE text.
fn encode_command(script: &str) -> String {
    let bytes: Vec<u8> = script.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
    STANDARD.encode(bytes)
}

// ── Session ──────────────────────────────────────────────────────────────

/// One Excel instance owned by one PowerShell driver process.
pub struct ExcelSession {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl ExcelSession {
    fn spawn(mut cmd: Command) -> Result<Self, Sheet2PdfError> {
        let mut child = cmd
            .args(["-EncodedCommand", &encode_command(DRIVER_SCRIPT)])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Sheet2PdfError::HostLaunchFailed {
                detail: e.to_string(),
            })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(i), Some(o)) => (i, o),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Sheet2PdfError::HostLaunchFailed {
                    detail: "driver pipes unavailable".into(),
                });
            }
        };

        let mut session = Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
        };

        // The driver answers once Excel.Application has been created.
        match session.read_reply() {
            Ok(version) => {
                info!(
                    "Excel {} started (driver pid {})",
                    version.as_str().unwrap_or("?"),
                    session.child.id()
                );
                Ok(session)
            }
            Err(e) => Err(Sheet2PdfError::HostLaunchFailed {
                detail: e.to_string(),
            }),
        }
    }

    fn call(&mut self, command: &DriverCommand<'_>) -> Result<serde_json::Value, Sheet2PdfError> {
        let line = encode_command_line(command)?;
        debug!("excel ← {}", line);

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Sheet2PdfError::automation("automation host has already quit"))?;
        writeln!(stdin, "{line}")
            .and_then(|_| stdin.flush())
            .map_err(|e| Sheet2PdfError::automation(format!("automation host stopped responding: {e}")))?;

        self.read_reply()
    }

    fn read_reply(&mut self) -> Result<serde_json::Value, Sheet2PdfError> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self.stdout.read_line(&mut line).map_err(|e| {
                Sheet2PdfError::automation(format!("lost contact with automation host: {e}"))
            })?;
            if n == 0 {
                return Err(Sheet2PdfError::automation("automation host exited unexpectedly"));
            }
            match parse_reply(&line) {
                Some(result) => return result,
                None => debug!("excel (ignored) {}", line.trim_end()),
            }
        }
    }
}

impl HostSession for ExcelSession {
    fn open_workbook(&mut self, path: &Path) -> Result<(), Sheet2PdfError> {
        self.call(&DriverCommand::Open { path }).map(|_| ())
    }

    fn worksheet_count(&mut self) -> Result<usize, Sheet2PdfError> {
        let value = self.call(&DriverCommand::SheetCount)?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| Sheet2PdfError::automation(format!("unexpected sheet count: {value}")))
    }

    fn worksheet_name(&mut self, index: usize) -> Result<String, Sheet2PdfError> {
        match self.call(&DriverCommand::SheetName { index })? {
            serde_json::Value::String(name) => Ok(name),
            other => Err(Sheet2PdfError::automation(format!(
                "unexpected name for sheet {index}: {other}"
            ))),
        }
    }

    fn apply_page_setup(&mut self, index: usize, setup: &PageSetup) -> Result<(), Sheet2PdfError> {
        self.call(&DriverCommand::PageSetup {
            index,
            orientation: setup.orientation.excel_code(),
            fit_wide: setup.fit_to_pages_wide,
            fit_tall: setup.fit_to_pages_tall,
        })
        .map(|_| ())
    }

    fn export_pdf(
        &mut self,
        index: usize,
        output: &Path,
        options: &ExportOptions,
    ) -> Result<(), Sheet2PdfError> {
        self.call(&DriverCommand::Export {
            index,
            path: output,
            quality: options.quality.excel_code(),
            include_doc_properties: options.include_doc_properties,
            ignore_print_areas: options.ignore_print_areas,
            open_after_publish: options.open_after_publish,
        })
        .map(|_| ())
    }

    fn close_workbook(&mut self, save_changes: bool) -> Result<(), Sheet2PdfError> {
        self.call(&DriverCommand::Close { save_changes }).map(|_| ())
    }

    fn quit(&mut self) -> Result<(), Sheet2PdfError> {
        if self.stdin.is_none() {
            return Ok(());
        }
        let result = self.call(&DriverCommand::Quit).map(|_| ());
        // EOF lets the driver finish its own teardown.
        self.stdin = None;
        result
    }
}

impl Drop for ExcelSession {
    fn drop(&mut self) {
        self.stdin = None;

        let deadline = std::time::Instant::now() + DRIVER_EXIT_GRACE;
        while std::time::Instant::now() < deadline {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!("Excel driver exited with {}", status);
                    return;
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(100)),
                Err(_) => break,
            }
        }

        warn!(
            "Excel driver (pid {}) did not exit; killing it. An EXCEL.EXE process may remain.",
            self.child.id()
        );
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_command_is_utf16le_base64() {
        assert_eq!(encode_command("ab"), "YQBiAA==");
    }

    #[test]
    fn non_ascii_paths_are_escaped_to_ascii() {
        let path = Path::new(r"C:\Users\Jörg\AppData\Local\Temp\sheet2pdf-x\upload-1.xlsx");
        let line = encode_command_line(&DriverCommand::Open { path }).unwrap();

        assert!(line.is_ascii(), "{line}");
        assert!(line.contains(r"J\u00f6rg"), "{line}");
        let back: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(back["path"], path.to_str().unwrap());
    }

    #[test]
    fn astral_characters_use_surrogate_pairs() {
        let path = Path::new("Q1 📊.pdf");
        let line = encode_command_line(&DriverCommand::Export {
            index: 1,
            path,
            quality: 0,
            include_doc_properties: true,
            ignore_print_areas: true,
            open_after_publish: false,
        })
        .unwrap();

        assert!(line.contains(r"\ud83d\udcca"), "{line}");
        let back: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(back["path"], "Q1 📊.pdf");
    }

    #[test]
    fn ascii_commands_are_unchanged() {
        let line = encode_command_line(&DriverCommand::SheetName { index: 3 }).unwrap();
        assert_eq!(line, r#"{"op":"sheet_name","index":3}"#);
    }

    #[test]
    fn driver_reads_stdin_as_utf8() {
        assert!(DRIVER_SCRIPT.contains("InputEncoding"));
    }

    #[test]
    fn page_setup_command_shape() {
        let cmd = DriverCommand::PageSetup {
            index: 2,
            orientation: 2,
            fit_wide: 1,
            fit_tall: None,
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "op": "page_setup", "index": 2, "orientation": 2, "fit_wide": 1, "fit_tall": null
            })
        );
    }

    #[test]
    fn unit_commands_carry_only_op() {
        let json = serde_json::to_value(DriverCommand::SheetCount).unwrap();
        assert_eq!(json, serde_json::json!({"op": "sheet_count"}));
        let json = serde_json::to_value(DriverCommand::Quit).unwrap();
        assert_eq!(json, serde_json::json!({"op": "quit"}));
    }

    #[test]
    fn export_command_carries_path_and_flags() {
        let path = Path::new("scratch/abc.pdf");
        let cmd = DriverCommand::Export {
            index: 1,
            path,
            quality: 0,
            include_doc_properties: true,
            ignore_print_areas: true,
            open_after_publish: false,
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["op"], "export");
        assert_eq!(json["path"], "scratch/abc.pdf");
        assert_eq!(json["ignore_print_areas"], true);
        assert_eq!(json["open_after_publish"], false);
    }

    #[test]
    fn non_json_lines_are_skipped() {
        assert!(parse_reply("WARNING: something noisy").is_none());
        assert!(parse_reply("").is_none());
    }

    #[test]
    fn ok_reply_yields_value() {
        let v = parse_reply(r#"{"ok":true,"value":3}"#).unwrap().unwrap();
        assert_eq!(v, serde_json::json!(3));
        let v = parse_reply(r#"{"value":null,"ok":true}"#).unwrap().unwrap();
        assert!(v.is_null());
    }

    #[test]
    fn error_reply_carries_host_message() {
        let err = parse_reply(r#"{"ok":false,"error":"Excel cannot open the file"}"#)
            .unwrap()
            .unwrap_err();
        assert_eq!(err.to_string(), "Excel cannot open the file");
    }

    #[test]
    fn garbled_reply_is_an_automation_error() {
        let err = parse_reply("{not json").unwrap().unwrap_err();
        assert!(err.to_string().contains("unreadable reply"));
    }

    #[test]
    fn platform_matches_target_os() {
        assert_eq!(ExcelHost::new().platform_supported(), cfg!(windows));
    }

    #[test]
    fn driver_script_handles_every_command() {
        for op in ["'open'", "'sheet_count'", "'sheet_name'", "'page_setup'", "'export'", "'close'", "'quit'"] {
            assert!(DRIVER_SCRIPT.contains(op), "driver is missing {op}");
        }
    }
}
