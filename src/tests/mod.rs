mod middleware;
mod scenarios;
