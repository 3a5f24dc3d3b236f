// state local to tui, decides how raw keys are translated
// the mode flags are synced from middle before every key
#[derive(Clone, Debug, Default)]
pub struct TuiState {
    // terminal reports key releases (kitty keyboard protocol)
    pub enhanced: bool,
    // recording a chord: Enter/Backspace/Esc drive the capture, not the app
    pub capturing: bool,
    // typing a title: printable keys are text, not chords
    pub renaming: bool,
}
