mod convert;
mod inspect;
mod repl;
mod run;
mod server;
mod verify;
