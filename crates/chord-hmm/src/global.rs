//! Process-wide corpus model.
//!
//! The model is built (or loaded) once and then shared read-only by every
//! inference call in the process.

use std::sync::OnceLock;

use crate::corpus::CorpusModel;
use crate::{Error, Result};

/// Global model (set once at startup)
static MODEL: OnceLock<CorpusModel> = OnceLock::new();

/// Install the global model. Fails if one is already installed.
pub fn init(model: CorpusModel) -> Result<&'static CorpusModel> {
    model.validate()?;
    MODEL.set(model).map_err(|_| Error::ModelAlreadyInitialized)?;
    MODEL.get().ok_or(Error::ModelAlreadyInitialized)
}

/// The global model, if installed.
pub fn model() -> Option<&'static CorpusModel> {
    MODEL.get()
}

/// The global model, building it with `build` on first use.
///
/// If two threads race, both may run `build`; one result wins and the other
/// is dropped.
pub fn get_or_build(build: impl FnOnce() -> Result<CorpusModel>) -> Result<&'static CorpusModel> {
    if let Some(model) = MODEL.get() {
        return Ok(model);
    }
    let built = build()?;
    built.validate()?;
    Ok(MODEL.get_or_init(|| built))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Annotation, CorpusBuilder, Song};
    use crate::pitch_table::PitchTable;

    // One test only: the static is shared by every test in this binary.
    #[test]
    fn built_once_then_shared() {
        let build = || {
            let song = Song::new(
                1,
                vec![
                    Annotation::new(0.0, 1.0, "C:maj"),
                    Annotation::new(1.0, 2.0, "G:maj"),
                ],
            );
            CorpusBuilder::default().build(&[song], &PitchTable::new())
        };

        let first = get_or_build(build).unwrap();
        let second = get_or_build(|| panic!("model built twice")).unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(std::ptr::eq(model().unwrap(), first));

        assert!(matches!(
            init(build().unwrap()),
            Err(Error::ModelAlreadyInitialized)
        ));
    }
}
