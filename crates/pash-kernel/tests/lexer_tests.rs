//! Lexer tests using rstest for parameterization.

use pash_kernel::lexer::{tokenize, LexerError, Token};
use rstest::rstest;

/// Render a token stream as space-separated token text.
fn lex(source: &str) -> String {
    tokenize(source)
        .unwrap_or_else(|errors| panic!("lex error for {:?}: {:?}", source, errors))
        .iter()
        .map(|spanned| spanned.token.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[rstest]
#[case::assignment("$x = 5", "$x = 5")]
#[case::compound_assignment("$total += 1", "$total += 1")]
#[case::scoped_variable("$env:HOME", "$env:HOME")]
#[case::braced_variable("${my var}", "$my var")]
#[case::cast("[int]'5'", "[int] '5'")]
#[case::static_call("[Math]::Sqrt(16)", "[Math] :: Sqrt ( 16 )")]
#[case::array_subexpression("@(1,2)", "@( 1 , 2 )")]
#[case::hash_literal("@{a=1}", "@{ a = 1 }")]
#[case::dash_operator("1 -eq 2", "1 -eq 2")]
#[case::number_suffixes("12L 0x10 2.5 1.50D", "12L 16 2.5 1.50D")]
#[case::command_line("Get-ChildItem -Path ./src | Sort-Object", "Get-ChildItem -Path ./src | Sort-Object")]
#[case::line_comment("a # trailing words", "a")]
#[case::block_comment("<# a\nblock #> b", "b")]
#[case::separators("a;b\nc", "a ; b newline c")]
#[case::line_continuation("a `\n b", "a b")]
#[case::doubled_single_quote("'it''s' + 1", "'it''s' + 1")]
#[case::expandable_stays_raw("\"hi $name\"", "\"hi $name\"")]
#[case::keywords_any_case("ForEach ($i IN $xs) {}", "foreach ( $i in $xs ) { }")]
fn tokens(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(lex(source), expected);
}

#[test]
fn here_strings_take_whole_lines() {
    let tokens = tokenize("@\"\nfirst $x\nsecond\n\"@").unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(
        tokens[0].token,
        Token::ExpandableHereString("first $x\nsecond".to_string())
    );
}

#[test]
fn unterminated_here_string_is_an_error() {
    let errors = tokenize("@'\nnever closed").unwrap_err();
    assert_eq!(errors[0].token, LexerError::UnterminatedHereString);
}

#[rstest]
#[case::stray_caret("1 + ^")]
#[case::stray_backslash_only("\\")]
fn invalid_input_has_positioned_errors(#[case] source: &str) {
    let errors = tokenize(source).unwrap_err();
    assert!(!errors.is_empty());
    assert!(errors[0].span.end <= source.len());
}
