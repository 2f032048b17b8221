use crate::error::Result;
use crate::lexer::Token;
use super::ast::*;
use super::Parser;

impl Parser {
    pub(super) fn parse_select(&mut self) -> Result<Statement> {
        self.push_context("SELECT statement");
        self.expect(Token::Select)?;

        let columns = self.parse_select_columns()?;

        // FROM clause (optional)
        let from = if *self.peek() == Token::From {
            self.advance();
            Some(self.parse_table_ref()?)
        } else {
            None
        };

        // If there's no FROM clause, disallow standalone WHERE/ORDER/LIMIT clauses
        if from.is_none() && (*self.peek() == Token::Where || *self.peek() == Token::Order || *self.peek() == Token::Limit) {
            return Err(self.error_with_context("Expected FROM clause before WHERE/ORDER/LIMIT".to_string()));
        }

        let where_clause = self.parse_where_clause()?;
        let order_by = self.parse_order_by_clause()?;
        let limit = self.parse_limit_clause()?;

        self.pop_context();

        Ok(Statement::Select(SelectStmt {
            columns,
            from,
            where_clause,
            order_by,
            limit,
        }))
    }

    /// Parse the column list in a SELECT statement
    pub(super) fn parse_select_columns(&mut self) -> Result<Vec<SelectColumn>> {
        self.push_context("column list");
        let mut columns = Vec::new();

        loop {
            if *self.peek() == Token::Star {
                self.advance();
                columns.push(SelectColumn::Star);
            } else if matches!(self.peek(), Token::Identifier(_)) {
                // Lookahead to distinguish table.* from table.column / a bare expression.
                let checkpoint = self.pos;
                let ident = self.consume_identifier()?;

                if *self.peek() == Token::Dot {
                    self.advance();
                    if *self.peek() == Token::Star {
                        self.advance();
                        columns.push(SelectColumn::QualifiedStar { table: ident });
                        if *self.peek() == Token::Comma {
                            self.advance();
                            continue;
                        } else {
                            break;
                        }
                    } else {
                        self.pos = checkpoint;
                        columns.push(self.parse_select_expr_column()?);
                    }
                } else {
                    self.pos = checkpoint;
                    columns.push(self.parse_select_expr_column()?);
                }
            } else {
                columns.push(self.parse_select_expr_column()?);
            }

            if *self.peek() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        self.pop_context();
        Ok(columns)
    }

    fn parse_select_expr_column(&mut self) -> Result<SelectColumn> {
        let expr = self.parse_expression()?;
        let alias = if *self.peek() == Token::As {
            self.advance();
            Some(self.consume_identifier()?)
        } else if matches!(self.peek(), Token::Identifier(_))
            && !matches!(self.peek(), Token::Identifier(s) if s.to_uppercase() == "FROM" || s.to_uppercase() == "WHERE")
        {
            Some(self.consume_identifier()?)
        } else {
            None
        };
        Ok(SelectColumn::Expr { expr, alias })
    }

    /// Parse a table reference with optional alias
    pub(super) fn parse_table_ref(&mut self) -> Result<TableRef> {
        let name = self.consume_identifier()?;

        let alias = if *self.peek() == Token::As {
            self.advance();
            Some(self.consume_identifier()?)
        } else if matches!(self.peek(), Token::Identifier(_))
            && !matches!(self.peek(), Token::Identifier(s) if
                s.to_uppercase() == "WHERE" ||
                s.to_uppercase() == "ORDER" ||
                s.to_uppercase() == "LIMIT")
        {
            Some(self.consume_identifier()?)
        } else {
            None
        };

        Ok(TableRef { name, alias })
    }
}
