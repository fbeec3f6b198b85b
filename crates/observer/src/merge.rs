//! Snapshot-versus-local comparator.
//!
//! Events are authoritative within one connection; a snapshot only fills
//! gaps. A snapshot for the session already held locally is accepted only
//! if it is at least as far along on progress, touched work and review
//! stage, and does not reopen a finished run. A late snapshot can never
//! roll back state that live events already advanced.

use cookbook_core::progress::JobSession;

/// Decide whether `snapshot` should replace `local`.
///
/// * no local session: accept
/// * different session id: accept (the server moved on)
/// * same id: accept only if `progress`, `touched()` and `stage()` did not
///   go down and a terminal local run is not reported as running again
pub fn should_accept_snapshot<S: JobSession>(local: Option<&S>, snapshot: &S) -> bool {
    let Some(local) = local else {
        return true;
    };
    if local.session_id() != snapshot.session_id() {
        return true;
    }
    if local.is_terminal() && !snapshot.is_terminal() {
        return false;
    }
    snapshot.progress() >= local.progress()
        && snapshot.touched() >= local.touched()
        && snapshot.stage() >= local.stage()
}
