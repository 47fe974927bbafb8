pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use derivative::Derivative;
pub use futures::{
    future,
    future::FutureExt as _,
    stream::{self, BoxStream, Stream, StreamExt as _, TryStreamExt as _},
};
pub use label::{Label, LabelSet};
pub use log::{debug, info, warn};
pub use par_stream::prelude::*;
pub use rand::{prelude::*, rngs::StdRng, seq::SliceRandom};
pub use std::{
    borrow::Borrow,
    fmt,
    fmt::Debug,
    fs, io,
    future::Future,
    path::{Path, PathBuf},
    pin::Pin,
    sync::Arc,
};
pub use tch::{nn, vision, Device, Kind, Tensor};
pub use tch_tensor_like::TensorLike;

pub type Fallible<T> = Result<T, Error>;
