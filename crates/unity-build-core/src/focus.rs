//! Foreground hint for a running Unity editor.
//!
//! The editor services the trigger file on its own update tick, which runs
//! slowly while the window is in the background. Bringing it forward is only
//! a nudge; the watcher picks the request up either way.

/// Window class of the Unity editor main window.
pub const UNITY_WINDOW_CLASS: &str = "UnityContainerWndClass";

/// Try to bring the editor window to the foreground.
///
/// Returns whether a window was found and focused. Always `false` on
/// platforms without support.
#[cfg(windows)]
pub async fn focus_editor() -> bool {
    use tokio::process::Command;
    use tracing::debug;

    let script = format!(
        r#"Add-Type -Namespace Win32 -Name User32 -MemberDefinition '[DllImport("user32.dll", CharSet = CharSet.Unicode)] public static extern System.IntPtr FindWindowW(string c, string w); [DllImport("user32.dll")] public static extern bool SetForegroundWindow(System.IntPtr h);'; $h = [Win32.User32]::FindWindowW('{UNITY_WINDOW_CLASS}', $null); if ($h -ne [System.IntPtr]::Zero) {{ [void][Win32.User32]::SetForegroundWindow($h); exit 0 }} else {{ exit 1 }}"#
    );

    match Command::new("powershell")
        .args(["-NoProfile", "-NonInteractive", "-Command", &script])
        .output()
        .await
    {
        Ok(out) => {
            debug!(found = out.status.success(), "Editor focus attempted");
            out.status.success()
        }
        Err(e) => {
            debug!(error = %e, "Failed to focus editor window");
            false
        }
    }
}

#[cfg(not(windows))]
pub async fn focus_editor() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_focus_is_noop_off_windows() {
        assert!(!focus_editor().await);
    }
}
