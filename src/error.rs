use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("coordinates ({x}, {y}) are outside the {width}x{height} board")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
    #[error("board must be at least 1x1")]
    EmptyBoard,
    #[error("mine mask has {actual} cells, board needs {expected}")]
    InvalidShape { expected: usize, actual: usize },
    #[error("a {width}x{height} board has more cells than can be addressed")]
    TooLarge { width: usize, height: usize },
}

pub type Result<T> = std::result::Result<T, BoardError>;
