// Lexer tests
mod lexer;


mod evaluator;

// Interpreter tests
mod interpreter;
mod registry;
mod contract;
