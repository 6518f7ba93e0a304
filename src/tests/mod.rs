mod eval;
mod linking;
